use crate::domain::asset::{TradingType, UploadedAsset};
use crate::domain::contract::SchemaContract;
use crate::domain::validation::ValidationResult;
use crate::llm::error::InferenceError;
use crate::llm::json::decode_phase;
use crate::llm::{InferenceClient, InferenceRequest};

fn prompt(trading_type: TradingType) -> String {
    let market = match trading_type {
        TradingType::Spot => "crypto",
        TradingType::Forex => "forex",
        TradingType::Equities => "stock",
    };
    [
        "You are an image classifier specialized in financial charts.".to_string(),
        String::new(),
        "STRICT VALIDATION CRITERIA:".to_string(),
        "1. The image MUST contain a candlestick, line or bar chart of price data.".to_string(),
        "2. The image MUST show a time axis (horizontal) and a price axis (vertical).".to_string(),
        "3. The image MUST show price movement over time.".to_string(),
        "4. Reject photos of people or objects, screenshots without charts and other non-financial images."
            .to_string(),
        String::new(),
        format!("The user expects a {market} chart; trading platform and charting screenshots are acceptable."),
        "Set chart_type to \"none\" whenever is_chart is false, and give a specific reason either way."
            .to_string(),
    ]
    .join("\n")
}

pub fn build_request(asset: &UploadedAsset, trading_type: TradingType) -> InferenceRequest {
    InferenceRequest::new(prompt(trading_type), SchemaContract::image_validation()).with_file(asset.url())
}

/// Phase 0. A negative classification is a normal `Ok`; only engine or
/// decoding failures are errors.
pub async fn validate(
    client: &dyn InferenceClient,
    asset: &UploadedAsset,
    trading_type: TradingType,
) -> Result<ValidationResult, InferenceError> {
    let raw = client.invoke(build_request(asset, trading_type)).await?;
    decode_phase(client.provider(), SchemaContract::IMAGE_VALIDATION, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::ChartType;
    use crate::llm::error::FailureKind;
    use crate::llm::replay::ReplayClient;
    use serde_json::json;

    fn asset() -> UploadedAsset {
        UploadedAsset::new("https://cdn.example.com/btc.png").unwrap()
    }

    #[test]
    fn request_carries_the_image_reference() {
        let req = build_request(&asset(), TradingType::Spot);
        assert_eq!(req.file_urls, vec!["https://cdn.example.com/btc.png".to_string()]);
        assert!(!req.use_external_context);
        assert_eq!(req.schema.name, SchemaContract::IMAGE_VALIDATION);
        assert!(req.prompt.contains("crypto chart"));
    }

    #[tokio::test]
    async fn negative_classification_is_not_an_error() {
        let client = ReplayClient::new().with_response(
            SchemaContract::IMAGE_VALIDATION,
            json!({"is_chart": false, "chart_type": "none", "reason": "photo of a cat"}),
        );
        let v = validate(&client, &asset(), TradingType::Spot).await.unwrap();
        assert!(!v.accepts());
        assert_eq!(v.chart_type, ChartType::None);
    }

    #[tokio::test]
    async fn missing_mandatory_field_is_a_schema_violation() {
        let client = ReplayClient::new()
            .with_response(SchemaContract::IMAGE_VALIDATION, json!({"is_chart": true}));
        let err = validate(&client, &asset(), TradingType::Forex).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::SchemaViolation);
    }
}
