use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AttemptError, OrchestratorError};
use crate::metrics::PROVIDER_FAILURES;
use crate::models::{AttemptSpec, PredictionRequest, RequestKind};
use crate::normalizer::{self, Strategy};
use crate::prompts::Prompt;
use crate::provider::ProviderClient;
use crate::validator;

/// A validated result plus which attempt produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    pub served_by: AttemptSpec,
    pub failed_attempts: usize,
}

async fn attempt(
    kind: RequestKind,
    spec: &AttemptSpec,
    prompt: &Prompt,
    client: &dyn ProviderClient,
) -> Result<Value, AttemptError> {
    let raw = client
        .call(
            &spec.provider_id,
            &spec.model_id,
            &prompt.user,
            &prompt.system,
            prompt.temperature,
        )
        .await?;

    let extraction = normalizer::extract(&raw, kind.shape())?;
    if normalizer::is_placeholder(&extraction.value) {
        // Either nothing parsed or the provider answered with its own error object
        warn!(attempt = %spec, strategy = ?extraction.strategy, "reply carried no usable result");
    } else if extraction.strategy != Strategy::Direct {
        debug!(attempt = %spec, strategy = ?extraction.strategy, "recovered structured value");
    }
    Ok(validator::validate(kind, extraction.value)?)
}

/// Walks `attempts` in order and returns the first result that survives
/// normalization and validation. Attempts are strictly sequential and a
/// failed attempt is never retried.
pub async fn resolve<F>(
    request: &PredictionRequest,
    attempts: &[AttemptSpec],
    prompt_builder: F,
    client: &dyn ProviderClient,
) -> Result<Resolution, OrchestratorError>
where
    F: Fn(&PredictionRequest) -> Prompt,
{
    let kind = request.kind();
    let prompt = prompt_builder(request);
    let mut last = None;

    for (index, spec) in attempts.iter().enumerate() {
        debug!(%kind, attempt = %spec, "trying provider");
        match attempt(kind, spec, &prompt, client).await {
            Ok(value) => {
                info!(%kind, attempt = %spec, failed_before = index, "provider result accepted");
                return Ok(Resolution {
                    value,
                    served_by: spec.clone(),
                    failed_attempts: index,
                });
            }
            Err(err) => {
                warn!(%kind, attempt = %spec, error = %err, "provider attempt failed");
                PROVIDER_FAILURES
                    .with_label_values(&[spec.provider_id.as_str()])
                    .inc();
                last = Some((spec.clone(), Box::new(err)));
            }
        }
    }

    Err(OrchestratorError::AllProvidersExhausted {
        attempts: attempts.len(),
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NormalizeError, ProviderError, ValidationError};
    use crate::prompts::build_prompt;
    use crate::test_support::ScriptedClient;

    const FORECAST: &str = r#"{"currentPrice": 190.0, "predictedPrices": {"oneDay": 191.0},
        "supportLevels": [180.0], "resistanceLevels": [200.0], "confidence": 60}"#;

    fn specs() -> Vec<AttemptSpec> {
        vec![
            AttemptSpec::new("a", "one"),
            AttemptSpec::new("b", "two"),
            AttemptSpec::new("c", "three"),
        ]
    }

    fn request() -> PredictionRequest {
        PredictionRequest::price_forecast("AAPL").unwrap()
    }

    #[tokio::test]
    async fn third_attempt_wins_after_two_invalid_results() {
        let client = ScriptedClient::new()
            .reply("a", "one", r#"{"currentPrice": 1.0}"#)
            .reply("b", "two", "Sorry, I cannot help with that.")
            .reply("c", "three", &format!("Sure!\n```json\n{FORECAST}\n```"));

        let resolution = resolve(&request(), &specs(), build_prompt, &client)
            .await
            .unwrap();

        let expected: Value = serde_json::from_str(FORECAST).unwrap();
        assert_eq!(resolution.value, expected);
        assert_eq!(resolution.served_by, AttemptSpec::new("c", "three"));
        assert_eq!(resolution.failed_attempts, 2);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let client = ScriptedClient::new()
            .reply("a", "one", FORECAST)
            .reply("b", "two", FORECAST);

        let resolution = resolve(&request(), &specs(), build_prompt, &client)
            .await
            .unwrap();
        assert_eq!(resolution.served_by.model_id, "one");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn every_attempt_receives_the_same_prompt() {
        let client = ScriptedClient::new();
        let _ = resolve(&request(), &specs(), build_prompt, &client).await;

        let prompt = build_prompt(&request());
        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        for call in calls {
            assert_eq!(call.prompt, prompt.user);
            assert_eq!(call.system, prompt.system);
            assert_eq!(call.temperature, prompt.temperature);
        }
    }

    #[tokio::test]
    async fn exhaustion_carries_last_error() {
        let client = ScriptedClient::new()
            .reply("a", "one", FORECAST.replace("currentPrice", "price").as_str())
            .reply("b", "two", "   ");

        let err = resolve(&request(), &specs(), build_prompt, &client)
            .await
            .unwrap_err();
        let OrchestratorError::AllProvidersExhausted { attempts, last } = err;
        assert_eq!(attempts, 3);
        let (spec, cause) = last.unwrap();
        assert_eq!(spec, AttemptSpec::new("c", "three"));
        assert!(matches!(
            *cause,
            AttemptError::Provider(ProviderError::HttpStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn empty_and_incomplete_replies_are_attempt_failures() {
        let only_empty = vec![AttemptSpec::new("b", "two")];
        let client = ScriptedClient::new().reply("b", "two", "");
        let OrchestratorError::AllProvidersExhausted { last, .. } =
            resolve(&request(), &only_empty, build_prompt, &client)
                .await
                .unwrap_err();
        assert!(matches!(
            *last.unwrap().1,
            AttemptError::Normalize(NormalizeError::EmptyInput)
        ));

        let only_partial = vec![AttemptSpec::new("a", "one")];
        let client = ScriptedClient::new().reply("a", "one", r#"{"currentPrice": 1.0}"#);
        let OrchestratorError::AllProvidersExhausted { last, .. } =
            resolve(&request(), &only_partial, build_prompt, &client)
                .await
                .unwrap_err();
        assert!(matches!(
            *last.unwrap().1,
            AttemptError::Validation(ValidationError::IncompleteResult { ref field }) if field == "predictedPrices"
        ));
    }

    #[tokio::test]
    async fn provider_error_objects_and_prose_fall_through() {
        let client = ScriptedClient::new()
            .reply("a", "one", r#"{"error": "rate limited", "message": "slow down"}"#)
            .reply("b", "two", "I'd rather not make predictions today.")
            .reply("c", "three", FORECAST);

        let resolution = resolve(&request(), &specs(), build_prompt, &client)
            .await
            .unwrap();
        assert_eq!(resolution.served_by, AttemptSpec::new("c", "three"));
        assert_eq!(resolution.failed_attempts, 2);
    }

    #[tokio::test]
    async fn no_attempts_means_exhausted() {
        let client = ScriptedClient::new();
        let err = resolve(&request(), &[], build_prompt, &client)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::AllProvidersExhausted { attempts: 0, last: None }
        ));
        assert_eq!(client.call_count(), 0);
    }
}
