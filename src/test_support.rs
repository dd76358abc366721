use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::audit::{AuditRecord, AuditSink};
use crate::error::{AuditError, ProviderError};
use crate::models::AttemptSpec;
use crate::provider::ProviderClient;

#[derive(Debug, Clone)]
pub struct Call {
    pub spec: AttemptSpec,
    pub prompt: String,
    pub system: String,
    pub temperature: f32,
}

// Canned replies per (provider, model); anything unscripted answers 503
#[derive(Default)]
pub struct ScriptedClient {
    replies: HashMap<AttemptSpec, String>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, provider: &str, model: &str, text: &str) -> Self {
        self.replies
            .insert(AttemptSpec::new(provider, model), text.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderClient for ScriptedClient {
    async fn call(
        &self,
        provider_id: &str,
        model_id: &str,
        prompt: &str,
        system_instruction: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let spec = AttemptSpec::new(provider_id, model_id);
        self.calls.lock().unwrap().push(Call {
            spec: spec.clone(),
            prompt: prompt.to_string(),
            system: system_instruction.to_string(),
            temperature,
        });
        self.replies
            .get(&spec)
            .cloned()
            .ok_or(ProviderError::HttpStatus {
                status: 503,
                body: "unavailable".into(),
            })
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    pub records: Mutex<Vec<AuditRecord>>,
    pub fail: bool,
}

impl RecordingAudit {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        if self.fail {
            return Err(AuditError::Write(std::io::Error::other("disk full")));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
