use crate::llm::Provider;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network failure or non-success status from the engine.
    Transport,
    /// The phase did not finish within its deadline.
    Timeout,
    /// The engine answered, but not with data of the requested shape.
    SchemaViolation,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
            FailureKind::SchemaViolation => "schema_violation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceError {
    pub kind: FailureKind,
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl InferenceError {
    pub fn transport(provider: Provider, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    pub fn schema_violation(
        provider: Provider,
        stage: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: FailureKind::SchemaViolation,
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    pub fn timeout(provider: Provider, stage: &'static str, after: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            provider,
            stage,
            detail: format!("no response after {}s", after.as_secs_f64()),
            raw_output: None,
            raw_response_json: None,
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }

    pub fn with_raw_json(mut self, raw: Value) -> Self {
        self.raw_response_json = Some(raw);
        self
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM {} error (provider={}, stage={}): {}",
            self.kind.as_str(),
            self.provider.as_str(),
            self.stage,
            self.detail
        )
    }
}

impl std::error::Error for InferenceError {}
