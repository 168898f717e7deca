use crate::domain::contract::SchemaContract;
use crate::llm::error::InferenceError;

pub mod anthropic;
pub mod error;
pub mod json;
pub mod replay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Replay,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Replay => "replay",
        }
    }
}

/// One schema-constrained call to the inference engine.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    pub schema: SchemaContract,
    pub file_urls: Vec<String>,
    pub use_external_context: bool,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>, schema: SchemaContract) -> Self {
        Self {
            prompt: prompt.into(),
            schema,
            file_urls: Vec::new(),
            use_external_context: false,
        }
    }

    pub fn with_file(mut self, url: impl Into<String>) -> Self {
        self.file_urls.push(url.into());
        self
    }

    pub fn with_external_context(mut self) -> Self {
        self.use_external_context = true;
        self
    }
}

#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Returns the engine's structured output. The value is not checked
    /// against `request.schema`; callers decode it into their phase type.
    async fn invoke(&self, request: InferenceRequest) -> Result<serde_json::Value, InferenceError>;
}
