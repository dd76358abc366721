use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use crate::error::ServiceError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{
    InvestmentIdea, InvestmentPreferences, MarketIndicators, MarketOutlook, PriceForecast,
    SectorPrediction, Sentiment, SentimentScope, Timeframe,
};
use crate::state::AppState;

const DEFAULT_TOP_SECTORS: usize = 3;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopSectorsQuery {
    limit: Option<usize>,
}

/// Service errors as HTTP responses. Only malformed requests are the
/// caller's fault; provider trouble never reaches this point.
#[derive(Debug)]
pub struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Decode(e) => {
                error!(error = %e, "stored result does not decode");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

// Request counter plus latency histogram around one service call
async fn tracked<T>(
    call: impl Future<Output = Result<T, ServiceError>>,
) -> Result<Json<T>, ApiError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();
    let result = call.await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    Ok(Json(result?))
}

pub async fn market_outlook_handler(
    State(state): State<Arc<AppState>>,
    Path(timeframe): Path<Timeframe>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<MarketOutlook>, ApiError> {
    tracked(state.service.market_outlook(timeframe, query.refresh)).await
}

pub async fn price_forecast_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<PriceForecast>, ApiError> {
    tracked(state.service.price_forecast(&ticker, query.refresh)).await
}

pub async fn market_sentiment_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<Sentiment>, ApiError> {
    tracked(state.service.sentiment(SentimentScope::Market, query.refresh)).await
}

pub async fn ticker_sentiment_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<Sentiment>, ApiError> {
    tracked(
        state
            .service
            .sentiment(SentimentScope::Ticker(ticker), query.refresh),
    )
    .await
}

pub async fn market_indicators_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> Result<Json<MarketIndicators>, ApiError> {
    tracked(state.service.market_indicators(query.refresh)).await
}

pub async fn investment_ideas_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
    Json(preferences): Json<InvestmentPreferences>,
) -> Result<Json<Vec<InvestmentIdea>>, ApiError> {
    tracked(state.service.investment_ideas(preferences, query.refresh)).await
}

pub async fn top_sectors_handler(
    State(state): State<Arc<AppState>>,
    Path(timeframe): Path<Timeframe>,
    Query(query): Query<TopSectorsQuery>,
) -> Result<Json<Vec<SectorPrediction>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_SECTORS);
    tracked(state.service.top_sectors(timeframe, limit)).await
}
