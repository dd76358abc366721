use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("prediction_requests_total", "Total number of prediction requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("prediction_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("prediction_cache_misses_total", "Total cache misses").unwrap();
    pub static ref PROVIDER_FAILURES: CounterVec = register_counter_vec!(
        "prediction_provider_failures_total",
        "Provider attempts discarded, by provider",
        &["provider"]
    )
    .unwrap();
    pub static ref SYNTHETIC_FALLBACKS: Counter = register_counter!(
        "prediction_synthetic_fallbacks_total",
        "Results served from the synthetic generator"
    )
    .unwrap();
    pub static ref AUDIT_FAILURES: Counter =
        register_counter!("prediction_audit_failures_total", "Audit writes that failed").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "prediction_request_latency_seconds",
        "Prediction latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("prediction_cache_size", "Current number of items in cache").unwrap();
}

// Text exposition of everything registered in the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
