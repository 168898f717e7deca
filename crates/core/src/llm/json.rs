use crate::llm::error::InferenceError;
use crate::llm::Provider;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.split_once('\n').map(|(_, rest)| rest) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Parses free-form model text into a JSON object.
pub fn parse_object(text: &str) -> anyhow::Result<Value> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let value = serde_json::from_str::<Value>(&json_str)
        .with_context(|| format!("LLM output is not valid JSON: {json_str}"))?;
    anyhow::ensure!(value.is_object(), "LLM output is not a JSON object: {json_str}");
    Ok(value)
}

/// Decodes a phase's structured output into its typed shape. A mismatch
/// is reported as a schema violation carrying the raw value.
pub fn decode_phase<T: DeserializeOwned>(
    provider: Provider,
    stage: &'static str,
    value: Value,
) -> Result<T, InferenceError> {
    if !value.is_object() {
        return Err(InferenceError::schema_violation(
            provider,
            stage,
            "structured output is not a JSON object",
        )
        .with_raw_json(value));
    }
    serde_json::from_value::<T>(value.clone()).map_err(|e| {
        InferenceError::schema_violation(provider, stage, e.to_string()).with_raw_json(value)
    })
}
