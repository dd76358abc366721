use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prediction_gateway::audit::{AuditSink, JsonlAuditSink, TracingAuditSink};
use prediction_gateway::cache::{MemoryCache, SystemClock, expiry_sweeper};
use prediction_gateway::config::Args;
use prediction_gateway::models::StructuredResult;
use prediction_gateway::provider::HttpProviderClient;
use prediction_gateway::service::PredictionService;
use prediction_gateway::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    // parse cli arguments
    let args = Args::parse();
    let service_config = args.service_config().context("invalid --extra-attempt")?;

    if args.gemini_api_key.is_none() && args.openrouter_api_key.is_none() {
        warn!("no provider API keys configured, every result will be synthetic");
    }

    let client = HttpProviderClient::new(args.provider_config())
        .context("failed to build provider HTTP client")?;

    let audit: Arc<dyn AuditSink> = match &args.audit_log {
        Some(path) => Arc::new(JsonlAuditSink::new(path)),
        None => Arc::new(TracingAuditSink),
    };

    let cache: Arc<MemoryCache<StructuredResult>> = Arc::new(MemoryCache::new(Arc::new(SystemClock)));
    let service = PredictionService::new(cache.clone(), Arc::new(client), audit, service_config);
    let config = service.config();
    info!(
        live_ttl = ?config.live_ttl,
        synthetic_ttl = ?config.synthetic_ttl,
        extra_attempts = config.extra_attempts.values().map(Vec::len).sum::<usize>(),
        audit_log = ?args.audit_log,
        "cache and audit configured"
    );

    // spawn the background sweeper
    let sweeper_cache = cache.clone();
    let sweep_every = Duration::from_secs(args.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        expiry_sweeper(sweeper_cache, sweep_every).await;
    });

    let app = prediction_gateway::router(Arc::new(AppState::new(service, cache)));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(port = args.port, "prediction gateway listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
