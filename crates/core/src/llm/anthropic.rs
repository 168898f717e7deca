use crate::config::Settings;
use crate::llm::error::InferenceError;
use crate::llm::json;
use crate::llm::{InferenceClient, InferenceRequest, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 90;
const DEFAULT_WEB_SEARCH_MAX_USES: u32 = 5;

const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";
const PAUSE_TURN: &str = "pause_turn";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    web_search_max_uses: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let web_search_max_uses = std::env::var("ANTHROPIC_WEB_SEARCH_MAX_USES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_WEB_SEARCH_MAX_USES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
            web_search_max_uses,
        })
    }

    async fn create_message(
        &self,
        req: &CreateMessageRequest,
    ) -> Result<(serde_json::Value, CreateMessageResponse), InferenceError> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&self.api_key).map_err(|e| {
            InferenceError::transport(Provider::Anthropic, "http", format!("invalid api key header: {e}"))
        })?;
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                InferenceError::transport(Provider::Anthropic, "http", format!("request failed: {e}"))
            })?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            InferenceError::transport(
                Provider::Anthropic,
                "http",
                format!("failed to read response body: {e}"),
            )
        })?;
        if !status.is_success() {
            let mut err =
                InferenceError::transport(Provider::Anthropic, "http", format!("status={status}"));
            if let Ok(raw) = serde_json::from_str::<serde_json::Value>(&text) {
                err = err.with_raw_json(raw);
            }
            return Err(err.with_raw_output(text));
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text).map_err(|e| {
            InferenceError::schema_violation(
                Provider::Anthropic,
                "decode",
                format!("response body is not JSON: {e}"),
            )
            .with_raw_output(text.clone())
        })?;
        let parsed = serde_json::from_value::<CreateMessageResponse>(raw_json.clone()).map_err(|e| {
            InferenceError::schema_violation(
                Provider::Anthropic,
                "decode",
                format!("failed to decode CreateMessageResponse: {e}"),
            )
            .with_raw_json(raw_json.clone())
        })?;
        Ok((raw_json, parsed))
    }

    fn tools(&self, request: &InferenceRequest) -> Vec<Tool> {
        let mut tools = vec![Tool::Custom {
            name: request.schema.tool_name(),
            description: request.schema.description.to_string(),
            input_schema: request.schema.schema.clone(),
        }];
        if request.use_external_context {
            tools.push(Tool::WebSearch {
                kind: WEB_SEARCH_TOOL_TYPE,
                name: "web_search",
                max_uses: self.web_search_max_uses,
            });
        }
        tools
    }

    fn tool_choice(request: &InferenceRequest) -> ToolChoice {
        // Forcing the emit tool would prevent web searches from running first.
        if request.use_external_context {
            ToolChoice::Any
        } else {
            ToolChoice::Tool {
                name: request.schema.tool_name(),
            }
        }
    }

    fn system_prompt(request: &InferenceRequest) -> String {
        let tool = request.schema.tool_name();
        let required = request.schema.required_fields().join(", ");
        [
            "You are a financial chart analysis engine.".to_string(),
            format!("Deliver your answer ONLY by calling the `{tool}` tool exactly once."),
            format!("Top-level keys that MUST be present: {required}."),
            "Use only the enum values the tool schema allows. Use numbers for numeric fields, never strings."
                .to_string(),
            "If a value cannot be read or found, omit the optional key instead of guessing."
                .to_string(),
        ]
        .join("\n")
    }

    fn build_request(&self, request: &InferenceRequest) -> CreateMessageRequest {
        let mut content: Vec<ContentPart> = request
            .file_urls
            .iter()
            .map(|url| ContentPart::Image {
                source: ImageSource::Url { url: url.clone() },
            })
            .collect();
        content.push(ContentPart::Text {
            text: request.prompt.clone(),
        });

        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(Self::system_prompt(request)),
            messages: vec![Message {
                role: "user",
                content,
            }],
            tools: Some(self.tools(request)),
            tool_choice: Some(Self::tool_choice(request)),
        }
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input(res: &CreateMessageResponse, tool_name: &str) -> Option<serde_json::Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == tool_name => Some(input.clone()),
            _ => None,
        })
    }

    fn extract_output(
        res: &CreateMessageResponse,
        raw_json: serde_json::Value,
        tool_name: &str,
    ) -> Result<serde_json::Value, InferenceError> {
        // Tool output path.
        if let Some(input) = Self::response_tool_input(res, tool_name) {
            return Ok(input);
        }

        // Fallback to text (should be rare).
        let text = Self::response_text(res);
        json::parse_object(&text).map_err(|e| {
            let detail = match res.stop_reason.as_deref() {
                Some(PAUSE_TURN) => format!(
                    "server tool loop paused (stop_reason={PAUSE_TURN}) before {tool_name} was called; \
                     web search did not finish within one turn"
                ),
                Some(reason) => format!("no {tool_name} tool call (stop_reason={reason}): {e:#}"),
                None => format!("no {tool_name} tool call: {e:#}"),
            };
            InferenceError::schema_violation(Provider::Anthropic, "structured_output", detail)
                .with_raw_output(text)
                .with_raw_json(raw_json)
        })
    }
}

#[async_trait::async_trait]
impl InferenceClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn invoke(&self, request: InferenceRequest) -> Result<serde_json::Value, InferenceError> {
        let req = self.build_request(&request);
        let tool_name = request.schema.tool_name();
        let t0 = std::time::Instant::now();

        let (raw_json, res) = self.create_message(&req).await?;
        tracing::debug!(
            schema = request.schema.name,
            stop_reason = res.stop_reason.as_deref().unwrap_or("none"),
            elapsed_ms = t0.elapsed().as_millis(),
            "anthropic message completed"
        );

        Self::extract_output(&res, raw_json, &tool_name)
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImageSource {
    Url { url: String },
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Tool {
    Custom {
        name: String,
        description: String,
        input_schema: serde_json::Value,
    },
    WebSearch {
        #[serde(rename = "type")]
        kind: &'static str,
        name: &'static str,
        max_uses: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolChoice {
    Tool { name: String },
    Any,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    // Thinking, server tool use and web search results are ignored.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::TradingType;
    use crate::domain::contract::SchemaContract;
    use crate::llm::error::FailureKind;
    use serde_json::json;

    fn client() -> AnthropicClient {
        AnthropicClient {
            http: reqwest::Client::new(),
            api_key: "test".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            web_search_max_uses: 3,
        }
    }

    #[test]
    fn parses_tool_use_input() {
        let res = CreateMessageResponse {
            content: vec![ContentBlock::ToolUse {
                name: "emit_image_validation".to_string(),
                input: json!({"is_chart": true, "chart_type": "candlestick", "reason": "ok"}),
            }],
            stop_reason: Some("tool_use".to_string()),
        };

        let out =
            AnthropicClient::extract_output(&res, json!({}), "emit_image_validation").unwrap();
        assert_eq!(out["chart_type"], "candlestick");
    }

    #[test]
    fn falls_back_to_fenced_text() {
        let res = CreateMessageResponse {
            content: vec![ContentBlock::Text {
                text: "```json\n{\"is_chart\": false, \"chart_type\": \"none\", \"reason\": \"selfie\"}\n```"
                    .to_string(),
            }],
            stop_reason: Some("end_turn".to_string()),
        };

        let out =
            AnthropicClient::extract_output(&res, json!({}), "emit_image_validation").unwrap();
        assert_eq!(out["reason"], "selfie");
    }

    #[test]
    fn prose_without_tool_call_is_a_schema_violation() {
        let res = CreateMessageResponse {
            content: vec![ContentBlock::Text {
                text: "I am unable to help with that.".to_string(),
            }],
            stop_reason: Some("max_tokens".to_string()),
        };

        let err = AnthropicClient::extract_output(&res, json!({}), "emit_chart_reading")
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::SchemaViolation);
        assert!(err.detail.contains("max_tokens"));
    }

    #[test]
    fn paused_web_search_turn_is_named_in_the_error() {
        let res = CreateMessageResponse {
            content: vec![ContentBlock::Unknown],
            stop_reason: Some("pause_turn".to_string()),
        };

        let err = AnthropicClient::extract_output(&res, json!({}), "emit_context_research")
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::SchemaViolation);
        assert!(err.detail.contains("stop_reason=pause_turn"));
        assert!(err.detail.contains("web search did not finish"));
    }

    #[test]
    fn decodes_unknown_blocks_from_web_search() {
        let raw = json!({
            "content": [
                {"type": "server_tool_use", "id": "srv_1", "name": "web_search", "input": {"query": "BBCA"}},
                {"type": "web_search_tool_result", "tool_use_id": "srv_1", "content": []},
                {"type": "tool_use", "id": "toolu_2", "name": "emit_context_research", "input": {"catalysts": []}}
            ],
            "stop_reason": "tool_use"
        });
        let res: CreateMessageResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(res.content.len(), 3);
        assert!(AnthropicClient::response_tool_input(&res, "emit_context_research").is_some());
    }

    #[test]
    fn builds_image_blocks_and_forced_tool() {
        let request = InferenceRequest::new("read it", SchemaContract::chart_reading(TradingType::Forex))
            .with_file("https://cdn.example.com/eurusd.png");
        let body = serde_json::to_value(client().build_request(&request)).unwrap();

        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["type"], "url");
        assert_eq!(content[0]["source"]["url"], "https://cdn.example.com/eurusd.png");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(body["tool_choice"], json!({"type": "tool", "name": "emit_chart_reading"}));
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn external_context_adds_web_search_and_relaxes_tool_choice() {
        let request =
            InferenceRequest::new("research BBCA", SchemaContract::context_research()).with_external_context();
        let body = serde_json::to_value(client().build_request(&request)).unwrap();

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[1]["type"], WEB_SEARCH_TOOL_TYPE);
        assert_eq!(tools[1]["max_uses"], 3);
        assert_eq!(body["tool_choice"], json!({"type": "any"}));
    }
}
