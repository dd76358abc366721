use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::AuditError;
use crate::models::RequestKind;

/// One resolved prediction, live or synthetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub request_type: RequestKind,
    pub params: Value,
    pub result: Value,
    pub is_synthetic: bool,
    // "provider/model" for live results
    pub served_by: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

// Writes a summary line through tracing; the result body is left out
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        info!(
            target: "audit",
            request_type = %record.request_type,
            params = %record.params,
            synthetic = record.is_synthetic,
            served_by = record.served_by.as_deref().unwrap_or("-"),
            "prediction recorded"
        );
        Ok(())
    }
}

/// Appends one JSON object per line.
pub struct JsonlAuditSink {
    path: PathBuf,
    // serializes appends so lines never interleave
    lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(synthetic: bool) -> AuditRecord {
        AuditRecord {
            request_type: RequestKind::PriceForecast,
            params: json!({"ticker": "AAPL"}),
            result: json!({"currentPrice": 190.0}),
            is_synthetic: synthetic,
            served_by: (!synthetic).then(|| "gemini/gemini-pro".to_string()),
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn jsonl_sink_appends_lines() {
        let path = std::env::temp_dir().join(format!(
            "prediction-audit-{}-{}.jsonl",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let sink = JsonlAuditSink::new(&path);

        sink.record(&record(false)).await.unwrap();
        sink.record(&record(true)).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<AuditRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].served_by.as_deref(), Some("gemini/gemini-pro"));
        assert!(lines[1].is_synthetic);
        assert!(contents.contains("\"requestType\":\"price-forecast\""));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn jsonl_sink_reports_unwritable_path() {
        let dir = std::env::temp_dir();
        // a directory cannot be opened for appending
        let sink = JsonlAuditSink::new(dir);
        assert!(matches!(
            sink.record(&record(false)).await,
            Err(AuditError::Write(_))
        ));
    }

    #[tokio::test]
    async fn tracing_sink_never_fails() {
        assert!(TracingAuditSink.record(&record(true)).await.is_ok());
    }
}
