use thiserror::Error;

use crate::models::AttemptSpec;

// Normalizer was handed nothing to parse
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("empty provider response")]
    EmptyInput,
}

// Validator rejection, names the first missing or mis-shaped field
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("incomplete result: missing or invalid field `{field}`")]
    IncompleteResult { field: String },
}

impl ValidationError {
    pub fn missing(field: impl Into<String>) -> Self {
        ValidationError::IncompleteResult {
            field: field.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider `{0}`")]
    UnknownProvider(String),
    #[error("no API key configured for provider `{0}`")]
    MissingApiKey(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("malformed response envelope: {0}")]
    Envelope(String),
    #[error("content generation stopped: {0}")]
    Blocked(String),
}

// Why a single (provider, model) attempt was discarded
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("all {attempts} provider attempts failed{}", last_error_suffix(.last))]
    AllProvidersExhausted {
        attempts: usize,
        last: Option<(AttemptSpec, Box<AttemptError>)>,
    },
}

fn last_error_suffix(last: &Option<(AttemptSpec, Box<AttemptError>)>) -> String {
    match last {
        Some((spec, err)) => format!(", last was {spec}: {err}"),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("audit record could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

// The only errors that escape the prediction service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("cached result does not match its request type: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid attempt spec `{0}`, expected <kind>=<provider>/<model>")]
    AttemptSpec(String),
    #[error("unknown request kind `{0}`")]
    UnknownKind(String),
}
