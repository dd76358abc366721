use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{AttemptSpec, RequestKind};
use crate::service::ServiceConfig;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "prediction-gateway")]
#[command(about = "Caching, fault-tolerant gateway for LLM market predictions")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // TTL for results served by a provider (default 6h)
    #[arg(long, default_value_t = 6 * 60 * 60)]
    pub live_ttl_secs: u64,

    // TTL for synthetic fallback results (default 2h)
    #[arg(long, default_value_t = 2 * 60 * 60)]
    pub synthetic_ttl_secs: u64,

    // Per-call provider timeout
    #[arg(long, default_value_t = 30)]
    pub provider_timeout_secs: u64,

    #[arg(long, default_value_t = 1024)]
    pub max_output_tokens: u32,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    #[arg(long, default_value = "https://generativelanguage.googleapis.com")]
    pub gemini_base_url: String,

    #[arg(long, default_value = "https://openrouter.ai/api/v1")]
    pub openrouter_base_url: String,

    // Extra attempts appended after the defaults, e.g.
    // "price-forecast=openrouter/mistralai/mistral-7b-instruct:free" (repeatable)
    #[arg(long = "extra-attempt")]
    pub extra_attempts: Vec<String>,

    // Append audit records to this JSON-lines file instead of the log
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    // Expired cache entry sweep interval
    #[arg(long, default_value_t = 300)]
    pub sweep_interval_secs: u64,
}

/// Everything the HTTP provider client needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub gemini_base_url: String,
    pub openrouter_base_url: String,
    pub timeout: Duration,
    pub max_output_tokens: u32,
    pub app_title: String,
}

// Parses `<kind>=<provider>/<model>`; the model id may itself contain '/'
pub fn parse_extra_attempt(raw: &str) -> Result<(RequestKind, AttemptSpec), ConfigError> {
    let (kind, target) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::AttemptSpec(raw.to_string()))?;
    let kind: RequestKind = kind.trim().parse()?;
    let (provider, model) = target
        .trim()
        .split_once('/')
        .ok_or_else(|| ConfigError::AttemptSpec(raw.to_string()))?;
    if provider.is_empty() || model.is_empty() {
        return Err(ConfigError::AttemptSpec(raw.to_string()));
    }
    Ok((kind, AttemptSpec::new(provider, model)))
}

impl Args {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            gemini_api_key: self.gemini_api_key.clone(),
            openrouter_api_key: self.openrouter_api_key.clone(),
            gemini_base_url: self.gemini_base_url.clone(),
            openrouter_base_url: self.openrouter_base_url.clone(),
            timeout: Duration::from_secs(self.provider_timeout_secs),
            max_output_tokens: self.max_output_tokens,
            app_title: "prediction-gateway".into(),
        }
    }

    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let mut extra_attempts: HashMap<RequestKind, Vec<AttemptSpec>> = HashMap::new();
        for raw in &self.extra_attempts {
            let (kind, spec) = parse_extra_attempt(raw)?;
            extra_attempts.entry(kind).or_default().push(spec);
        }
        Ok(ServiceConfig {
            live_ttl: Duration::from_secs(self.live_ttl_secs),
            synthetic_ttl: Duration::from_secs(self.synthetic_ttl_secs),
            extra_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["prediction-gateway"]);
        assert_eq!(args.port, 8080);
        let config = args.service_config().unwrap();
        assert_eq!(config.live_ttl, Duration::from_secs(21_600));
        assert_eq!(config.synthetic_ttl, Duration::from_secs(7_200));
        assert!(config.extra_attempts.is_empty());
    }

    #[test]
    fn extra_attempts_keep_slashes_in_model_ids() {
        let (kind, spec) =
            parse_extra_attempt("price-forecast=openrouter/mistralai/mistral-7b-instruct:free")
                .unwrap();
        assert_eq!(kind, RequestKind::PriceForecast);
        assert_eq!(spec.provider_id, "openrouter");
        assert_eq!(spec.model_id, "mistralai/mistral-7b-instruct:free");
    }

    #[test]
    fn bad_extra_attempts_are_rejected() {
        assert!(matches!(
            parse_extra_attempt("price-forecast"),
            Err(ConfigError::AttemptSpec(_))
        ));
        assert!(matches!(
            parse_extra_attempt("price-forecast=gemini"),
            Err(ConfigError::AttemptSpec(_))
        ));
        assert!(matches!(
            parse_extra_attempt("horoscope=gemini/gemini-pro"),
            Err(ConfigError::UnknownKind(_))
        ));
    }

    #[test]
    fn repeated_flags_accumulate_per_kind() {
        let args = Args::parse_from([
            "prediction-gateway",
            "--extra-attempt",
            "market-sentiment=gemini/gemini-pro",
            "--extra-attempt",
            "market-sentiment=openrouter/a/b",
        ]);
        let config = args.service_config().unwrap();
        assert_eq!(config.extra_attempts[&RequestKind::MarketSentiment].len(), 2);
    }
}
