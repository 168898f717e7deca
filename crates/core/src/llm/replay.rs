use crate::llm::error::{FailureKind, InferenceError};
use crate::llm::{InferenceClient, InferenceRequest, Provider};
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Offline engine that answers each request with a canned output keyed by
/// schema name, and remembers every request it was given.
///
/// Fixture files are a JSON object mapping schema names to outputs:
///
/// ```json
/// {
///   "image_validation": {"is_chart": true, "chart_type": "candlestick", "reason": "..."},
///   "chart_reading": {"instrument": {"symbol": "BTC/USDT"}},
///   "recommendation": {"action": "BUY", "confidence_score": 96}
/// }
/// ```
#[derive(Debug, Default)]
pub struct ReplayClient {
    responses: HashMap<String, Value>,
    failures: HashMap<String, FailureKind>,
    delay: Option<Duration>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ReplayClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay fixture {}", path.display()))?;
        let fixture = serde_json::from_str::<HashMap<String, Value>>(&text)
            .with_context(|| format!("replay fixture {} is not a JSON object", path.display()))?;

        let mut client = Self::new();
        for (name, output) in fixture {
            client = client.with_response(name, output);
        }
        Ok(client)
    }

    pub fn with_response(mut self, schema_name: impl Into<String>, output: Value) -> Self {
        self.responses.insert(schema_name.into(), output);
        self
    }

    pub fn with_failure(mut self, schema_name: impl Into<String>, kind: FailureKind) -> Self {
        self.failures.insert(schema_name.into(), kind);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn calls_for(&self, schema_name: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.schema.name == schema_name)
            .count()
    }
}

#[async_trait::async_trait]
impl InferenceClient for ReplayClient {
    fn provider(&self) -> Provider {
        Provider::Replay
    }

    async fn invoke(&self, request: InferenceRequest) -> Result<Value, InferenceError> {
        let name = request.schema.name;
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.failures.get(name) {
            Some(FailureKind::Transport) => {
                return Err(InferenceError::transport(
                    Provider::Replay,
                    "replay",
                    format!("scripted transport failure for {name}"),
                ))
            }
            Some(FailureKind::Timeout) => {
                return Err(InferenceError::timeout(
                    Provider::Replay,
                    "replay",
                    Duration::ZERO,
                ))
            }
            Some(FailureKind::SchemaViolation) => {
                return Err(InferenceError::schema_violation(
                    Provider::Replay,
                    "replay",
                    format!("scripted schema violation for {name}"),
                ))
            }
            None => {}
        }

        self.responses.get(name).cloned().ok_or_else(|| {
            InferenceError::transport(
                Provider::Replay,
                "replay",
                format!("no replay output recorded for schema {name}"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::contract::SchemaContract;
    use serde_json::json;

    #[tokio::test]
    async fn answers_by_schema_name_and_records_requests() {
        let client = ReplayClient::new().with_response(
            SchemaContract::IMAGE_VALIDATION,
            json!({"is_chart": true, "chart_type": "line", "reason": "price line"}),
        );

        let out = client
            .invoke(InferenceRequest::new("classify", SchemaContract::image_validation()))
            .await
            .unwrap();
        assert_eq!(out["chart_type"], "line");
        assert_eq!(client.calls_for(SchemaContract::IMAGE_VALIDATION), 1);
        assert_eq!(client.requests()[0].prompt, "classify");
    }

    #[tokio::test]
    async fn missing_output_is_a_transport_error() {
        let client = ReplayClient::new();
        let err = client
            .invoke(InferenceRequest::new("x", SchemaContract::context_research()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Transport);
    }

    #[test]
    fn loads_fixture_file() {
        let path = std::env::temp_dir().join(format!("replay-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"recommendation": {"action": "HOLD"}}"#).unwrap();
        let client = ReplayClient::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(client.responses["recommendation"]["action"], "HOLD");
    }
}
