mod cache;
mod health;
mod metrics;
mod predictions;

pub use cache::invalidate_kind_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use predictions::{
    ApiError, investment_ideas_handler, market_indicators_handler, market_outlook_handler,
    market_sentiment_handler, price_forecast_handler, ticker_sentiment_handler, top_sectors_handler,
};
