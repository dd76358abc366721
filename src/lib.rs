//! Caching, fault-tolerant gateway in front of LLM providers for market
//! predictions. Every request resolves to a schema-valid result: cached,
//! live from the first provider that answers well, or synthetic.

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
mod lenient;
pub mod metrics;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
pub mod provider;
pub mod service;
pub mod state;
pub mod synthetic;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use crate::handlers::{
    health_handler, invalidate_kind_handler, investment_ideas_handler, market_indicators_handler,
    market_outlook_handler, market_sentiment_handler, metrics_handler, price_forecast_handler,
    ticker_sentiment_handler, top_sectors_handler,
};
use crate::state::AppState;

// creating the router with routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/market-outlook/{timeframe}", get(market_outlook_handler))
        .route("/api/price-forecast/{ticker}", get(price_forecast_handler))
        .route("/api/sentiment", get(market_sentiment_handler))
        .route("/api/sentiment/{ticker}", get(ticker_sentiment_handler))
        .route("/api/market-indicators", get(market_indicators_handler))
        .route("/api/investment-ideas", post(investment_ideas_handler))
        .route("/api/top-sectors/{timeframe}", get(top_sectors_handler))
        .route("/api/cache/{kind}", delete(invalidate_kind_handler))
        .with_state(state)
}
