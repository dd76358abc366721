use chrono::Utc;
use serde::de::DeserializeOwned;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audit::{AuditRecord, AuditSink};
use crate::cache::{CacheStore, kind_prefix, make_cache_key};
use crate::error::ServiceError;
use crate::metrics::{AUDIT_FAILURES, CACHE_HITS, CACHE_MISSES, SYNTHETIC_FALLBACKS};
use crate::models::{
    AttemptSpec, InvestmentIdea, InvestmentPreferences, MarketIndicators, MarketOutlook,
    PredictionRequest, PriceForecast, RequestKind, SectorPrediction, Sentiment, SentimentScope, StructuredResult,
    Timeframe,
};
use crate::orchestrator;
use crate::prompts::{build_prompt, default_attempts};
use crate::provider::ProviderClient;
use crate::synthetic;

/// TTL policy and attempt overrides.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub live_ttl: Duration,
    // shorter so a real answer is retried sooner
    pub synthetic_ttl: Duration,
    pub extra_attempts: HashMap<RequestKind, Vec<AttemptSpec>>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            live_ttl: Duration::from_secs(6 * 60 * 60),
            synthetic_ttl: Duration::from_secs(2 * 60 * 60),
            extra_attempts: HashMap::new(),
        }
    }
}

impl ServiceConfig {
    // Default sequence for the kind, then configured extras
    pub fn attempts(&self, kind: RequestKind) -> Vec<AttemptSpec> {
        let mut attempts = default_attempts(kind);
        if let Some(extra) = self.extra_attempts.get(&kind) {
            attempts.extend(extra.iter().cloned());
        }
        attempts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub force_refresh: bool,
}

impl FetchOptions {
    pub fn refresh(force_refresh: bool) -> Self {
        Self { force_refresh }
    }
}

pub struct PredictionService {
    cache: Arc<dyn CacheStore<StructuredResult>>,
    client: Arc<dyn ProviderClient>,
    audit: Arc<dyn AuditSink>,
    config: ServiceConfig,
}

fn decode<T: DeserializeOwned>(result: StructuredResult) -> Result<T, ServiceError> {
    Ok(serde_json::from_value(result.value)?)
}

// Bullish first, then by midpoint of the return range; unparseable ranges last
fn rank_sectors(a: &SectorPrediction, b: &SectorPrediction) -> Ordering {
    let midpoint = |s: &SectorPrediction| s.return_range().map(|(low, high)| (low + high) / 2.0);
    b.outlook.score().cmp(&a.outlook.score()).then_with(|| {
        match (midpoint(a), midpoint(b)) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    })
}

impl PredictionService {
    pub fn new(
        cache: Arc<dyn CacheStore<StructuredResult>>,
        client: Arc<dyn ProviderClient>,
        audit: Arc<dyn AuditSink>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            cache,
            client,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn audit(&self, request: &PredictionRequest, result: &StructuredResult, served_by: Option<&AttemptSpec>) {
        let record = AuditRecord {
            request_type: result.kind,
            params: request.params(),
            result: result.value.clone(),
            is_synthetic: result.synthetic,
            served_by: served_by.map(ToString::to_string),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.audit.record(&record).await {
            AUDIT_FAILURES.inc();
            warn!(kind = %result.kind, error = %e, "audit write failed");
        }
    }

    /// Cached result for `request`, or a fresh one from the first provider
    /// that answers with a valid value, or a synthetic stand-in. Never fails
    /// for lack of live data.
    pub async fn get_prediction(
        &self,
        request: &PredictionRequest,
        options: FetchOptions,
    ) -> StructuredResult {
        let kind = request.kind();
        let key = make_cache_key(request);

        if options.force_refresh {
            debug!(%kind, key = %key, "forced refresh, invalidating");
            self.cache.invalidate(&key);
        } else if let Some(hit) = self.cache.get(&key) {
            CACHE_HITS.inc();
            debug!(%kind, key = %key, synthetic = hit.synthetic, "cache hit");
            return hit;
        }
        CACHE_MISSES.inc();

        let attempts = self.config.attempts(kind);
        match orchestrator::resolve(request, &attempts, build_prompt, self.client.as_ref()).await {
            Ok(resolution) => {
                let mut value = resolution.value;
                request.decorate(&mut value);
                let result = StructuredResult {
                    kind,
                    synthetic: false,
                    value,
                };
                self.cache.set(&key, result.clone(), self.config.live_ttl);
                self.audit(request, &result, Some(&resolution.served_by)).await;
                result
            }
            Err(err) => {
                SYNTHETIC_FALLBACKS.inc();
                info!(%kind, error = %err, "no live result, serving synthetic");
                let value = {
                    let mut rng = rand::thread_rng();
                    synthetic::generate(request, &mut rng)
                };
                let result = StructuredResult {
                    kind,
                    synthetic: true,
                    value,
                };
                self.cache.set(&key, result.clone(), self.config.synthetic_ttl);
                self.audit(request, &result, None).await;
                result
            }
        }
    }

    pub async fn market_outlook(
        &self,
        timeframe: Timeframe,
        force_refresh: bool,
    ) -> Result<MarketOutlook, ServiceError> {
        let request = PredictionRequest::market_outlook(timeframe);
        decode(
            self.get_prediction(&request, FetchOptions::refresh(force_refresh))
                .await,
        )
    }

    pub async fn price_forecast(
        &self,
        ticker: &str,
        force_refresh: bool,
    ) -> Result<PriceForecast, ServiceError> {
        let request = PredictionRequest::price_forecast(ticker)?;
        decode(
            self.get_prediction(&request, FetchOptions::refresh(force_refresh))
                .await,
        )
    }

    pub async fn sentiment(
        &self,
        scope: SentimentScope,
        force_refresh: bool,
    ) -> Result<Sentiment, ServiceError> {
        let request = PredictionRequest::sentiment(scope)?;
        let result = self
            .get_prediction(&request, FetchOptions::refresh(force_refresh))
            .await;
        let kind = result.kind;
        Ok(match kind {
            RequestKind::TickerSentiment => Sentiment::Ticker(decode(result)?),
            _ => Sentiment::Market(decode(result)?),
        })
    }

    pub async fn market_indicators(
        &self,
        force_refresh: bool,
    ) -> Result<MarketIndicators, ServiceError> {
        let request = PredictionRequest::market_indicators();
        decode(
            self.get_prediction(&request, FetchOptions::refresh(force_refresh))
                .await,
        )
    }

    pub async fn investment_ideas(
        &self,
        preferences: InvestmentPreferences,
        force_refresh: bool,
    ) -> Result<Vec<InvestmentIdea>, ServiceError> {
        let request = PredictionRequest::investment_ideas(preferences)?;
        decode(
            self.get_prediction(&request, FetchOptions::refresh(force_refresh))
                .await,
        )
    }

    /// Sectors of the (possibly cached) outlook, strongest first.
    pub async fn top_sectors(
        &self,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<SectorPrediction>, ServiceError> {
        let mut sectors = self.market_outlook(timeframe, false).await?.sector_predictions;
        sectors.sort_by(rank_sectors);
        sectors.truncate(limit);
        Ok(sectors)
    }

    // Drop every cached result of one kind
    pub fn invalidate_kind(&self, kind: RequestKind) {
        info!(%kind, "invalidating cached results");
        self.cache.invalidate_prefix(&kind_prefix(kind));
    }
}
