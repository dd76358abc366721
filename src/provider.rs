use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::prompts::{GEMINI, OPENROUTER};

const MAX_ERROR_BODY: usize = 512;

/// One text completion against one (provider, model) pair. Any error means
/// "this attempt failed"; callers do not distinguish between them.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn call(
        &self,
        provider_id: &str,
        model_id: &str,
        prompt: &str,
        system_instruction: &str,
        temperature: f32,
    ) -> Result<String, ProviderError>;
}

pub struct HttpProviderClient {
    client: reqwest::Client,
    config: ProviderConfig,
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

fn require_key<'a>(provider: &str, key: &'a Option<String>) -> Result<&'a str, ProviderError> {
    key.as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ProviderError::MissingApiKey(provider.to_string()))
}

// gemini-1.5 models are only served from the beta API
fn gemini_api_version(model: &str) -> &'static str {
    if model.starts_with("gemini-1.5") { "v1beta" } else { "v1" }
}

fn non_empty(text: Option<&str>, what: &str) -> Result<String, ProviderError> {
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
        _ => Err(ProviderError::Envelope(format!("empty {what}"))),
    }
}

pub(crate) fn gemini_text(body: &Value) -> Result<String, ProviderError> {
    let candidate = body
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| ProviderError::Envelope("no candidates in response".into()))?;

    if let Some(reason) = candidate.get("finishReason").and_then(Value::as_str) {
        if matches!(reason, "SAFETY" | "RECITATION" | "OTHER") {
            return Err(ProviderError::Blocked(reason.to_string()));
        }
    }

    non_empty(
        candidate
            .pointer("/content/parts/0/text")
            .and_then(Value::as_str),
        "content",
    )
}

pub(crate) fn openrouter_text(body: &Value) -> Result<String, ProviderError> {
    let choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .ok_or_else(|| ProviderError::Envelope("no choices in response".into()))?;

    non_empty(
        choice.pointer("/message/content").and_then(Value::as_str),
        "message content",
    )
}

impl HttpProviderClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn post(&self, request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let res = request.send().await?;
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body: truncate(body),
            });
        }
        serde_json::from_str(&body).map_err(|e| ProviderError::Envelope(e.to_string()))
    }

    async fn gemini(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let key = require_key(GEMINI, &self.config.gemini_api_key)?;
        let url = format!(
            "{}/{}/models/{}:generateContent?key={}",
            self.config.gemini_base_url.trim_end_matches('/'),
            gemini_api_version(model),
            model,
            key
        );

        let mut parts = Vec::new();
        if !system.is_empty() {
            parts.push(json!({ "text": system }));
        }
        parts.push(json!({ "text": prompt }));

        let payload = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            }
        });

        let body = self.post(self.client.post(url).json(&payload)).await?;
        gemini_text(&body)
    }

    async fn openrouter(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let key = require_key(OPENROUTER, &self.config.openrouter_api_key)?;
        let url = format!(
            "{}/chat/completions",
            self.config.openrouter_base_url.trim_end_matches('/')
        );

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let payload = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": self.config.max_output_tokens,
        });

        let request = self
            .client
            .post(url)
            .bearer_auth(key)
            .header("X-Title", self.config.app_title.as_str())
            .json(&payload);
        let body = self.post(request).await?;
        openrouter_text(&body)
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    #[instrument(skip(self, prompt, system_instruction))]
    async fn call(
        &self,
        provider_id: &str,
        model_id: &str,
        prompt: &str,
        system_instruction: &str,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        debug!(prompt_len = prompt.len(), temperature, "calling provider");
        match provider_id {
            GEMINI => self.gemini(model_id, prompt, system_instruction, temperature).await,
            OPENROUTER => {
                self.openrouter(model_id, prompt, system_instruction, temperature)
                    .await
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> ProviderConfig {
        ProviderConfig {
            gemini_api_key: None,
            openrouter_api_key: Some("  ".into()),
            gemini_base_url: "http://127.0.0.1:9".into(),
            openrouter_base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_secs(1),
            max_output_tokens: 256,
            app_title: "test".into(),
        }
    }

    #[test]
    fn gemini_envelope() {
        let ok = json!({"candidates": [{"content": {"parts": [{"text": "{\"a\":1}"}]}, "finishReason": "STOP"}]});
        assert_eq!(gemini_text(&ok).unwrap(), "{\"a\":1}");

        let blocked = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert!(matches!(gemini_text(&blocked), Err(ProviderError::Blocked(r)) if r == "SAFETY"));

        let empty = json!({"candidates": []});
        assert!(matches!(gemini_text(&empty), Err(ProviderError::Envelope(_))));

        let no_parts = json!({"candidates": [{"content": {"parts": []}}]});
        assert!(matches!(gemini_text(&no_parts), Err(ProviderError::Envelope(_))));
    }

    #[test]
    fn openrouter_envelope() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "[1]"}}]});
        assert_eq!(openrouter_text(&ok).unwrap(), "[1]");

        let blank = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(matches!(openrouter_text(&blank), Err(ProviderError::Envelope(_))));
        assert!(openrouter_text(&json!({"error": "rate limited"})).is_err());
    }

    #[test]
    fn picks_gemini_api_version() {
        assert_eq!(gemini_api_version("gemini-1.5-flash"), "v1beta");
        assert_eq!(gemini_api_version("gemini-pro"), "v1");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let cut = truncate(body);
        assert!(cut.len() <= MAX_ERROR_BODY);
        assert!(cut.chars().all(|c| c == 'é'));
    }

    #[tokio::test]
    async fn missing_keys_and_unknown_providers_fail_the_attempt() {
        let client = HttpProviderClient::new(config()).unwrap();

        let err = client.call(GEMINI, "gemini-pro", "p", "s", 0.3).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey(p) if p == GEMINI));

        let err = client.call(OPENROUTER, "m", "p", "s", 0.3).await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingApiKey(p) if p == OPENROUTER));

        let err = client.call("mystery", "m", "p", "s", 0.3).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(p) if p == "mystery"));
    }
}
