use crate::domain::asset::TradingType;
use crate::domain::recommendation::{Action, TimeHorizon};
use serde_json::{json, Value};

/// Named, versioned shape an inference phase asks the engine to emit.
///
/// The contract is enforced by request only: responses are decoded into the
/// phase's output type, whose optional fields tolerate omissions.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaContract {
    pub name: &'static str,
    pub version: u32,
    pub description: &'static str,
    pub schema: Value,
}

impl SchemaContract {
    pub const IMAGE_VALIDATION: &'static str = "image_validation";
    pub const CHART_READING: &'static str = "chart_reading";
    pub const CONTEXT_RESEARCH: &'static str = "context_research";
    pub const RECOMMENDATION: &'static str = "recommendation";

    pub fn tool_name(&self) -> String {
        format!("emit_{}", self.name)
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn image_validation() -> Self {
        Self {
            name: Self::IMAGE_VALIDATION,
            version: 1,
            description: "Classify whether the image is a financial price chart",
            schema: json!({
                "type": "object",
                "additionalProperties": false,
                "required": ["is_chart", "chart_type", "reason"],
                "properties": {
                    "is_chart": {"type": "boolean"},
                    "chart_type": {"type": "string", "enum": ["candlestick", "line", "bar", "none"]},
                    "reason": {"type": "string"}
                }
            }),
        }
    }

    pub fn chart_reading(trading_type: TradingType) -> Self {
        let mut technical = json!({
            "type": "object",
            "required": ["trend", "pattern", "support_levels", "resistance_levels", "indicators"],
            "properties": {
                "trend": {"type": "string", "enum": ["bullish", "bearish", "sideways"]},
                "pattern": {"type": "string"},
                "secondary_patterns": {"type": "array", "items": {"type": "string"}},
                "support_levels": {"type": "array", "items": {"type": "number"}},
                "resistance_levels": {"type": "array", "items": {"type": "number"}},
                "indicators": {
                    "type": "object",
                    "properties": {
                        "rsi": {"type": "string"},
                        "macd": {"type": "string"},
                        "moving_average": {"type": "string"},
                        "bollinger_bands": {"type": "string"},
                        "stochastic": {"type": "string"}
                    }
                },
                "volume_analysis": {"type": "string"}
            }
        });
        if !trading_type.needs_research() {
            technical["properties"]["volume_confirmation"] = json!({"type": "boolean"});
        }

        Self {
            name: Self::CHART_READING,
            version: 1,
            description: "Instrument identity and technical-analysis facts read from the chart",
            schema: json!({
                "type": "object",
                "required": ["instrument", "technical", "timeframe", "confidence"],
                "properties": {
                    "instrument": {
                        "type": "object",
                        "required": ["symbol"],
                        "properties": {
                            "symbol": {"type": "string"},
                            "name": {"type": "string"},
                            "sector": {"type": "string"}
                        }
                    },
                    "price": {
                        "type": "object",
                        "properties": {
                            "current": {"type": "number"},
                            "high": {"type": "number"},
                            "low": {"type": "number"},
                            "change": {"type": "number"},
                            "change_percent": {"type": "number"}
                        }
                    },
                    "technical": technical,
                    "timeframe": {"type": "string"},
                    "chart_quality_score": {"type": "number", "description": "1-100"},
                    "confidence": {"type": "number", "description": "85-98"}
                }
            }),
        }
    }

    pub fn context_research() -> Self {
        Self {
            name: Self::CONTEXT_RESEARCH,
            version: 1,
            description: "Recent news, fundamentals and catalysts for the instrument",
            schema: json!({
                "type": "object",
                "required": ["news", "fundamentals", "catalysts", "sector_outlook", "market_sentiment"],
                "properties": {
                    "news": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["headline", "summary", "sentiment", "impact_score", "source", "date"],
                            "properties": {
                                "headline": {"type": "string"},
                                "summary": {"type": "string"},
                                "sentiment": {"type": "string", "enum": ["positive", "negative", "neutral"]},
                                "impact_score": {"type": "number", "minimum": 1, "maximum": 10},
                                "source": {"type": "string"},
                                "date": {"type": "string"}
                            }
                        }
                    },
                    "fundamentals": {
                        "type": "object",
                        "properties": {
                            "pe_ratio": {"type": "number"},
                            "pbv_ratio": {"type": "number"},
                            "dividend_yield": {"type": "number"},
                            "market_cap": {"type": "string"},
                            "revenue_growth": {"type": "string"},
                            "profit_margin": {"type": "string"},
                            "debt_to_equity": {"type": "number"}
                        }
                    },
                    "catalysts": {"type": "array", "items": {"type": "string"}},
                    "sector_outlook": {"type": "string"},
                    "market_sentiment": {
                        "type": "string",
                        "enum": ["very_positive", "positive", "neutral", "negative", "very_negative"]
                    }
                }
            }),
        }
    }

    pub fn recommendation(trading_type: TradingType) -> Self {
        let actions: Vec<&str> = Action::ALL
            .into_iter()
            .filter(|a| trading_type.allows_short() || !a.is_short())
            .map(Action::as_str)
            .collect();
        let horizons: Vec<&str> = [TimeHorizon::ShortTerm, TimeHorizon::MediumTerm, TimeHorizon::LongTerm]
            .into_iter()
            .map(TimeHorizon::as_str)
            .collect();
        let (lo, hi) = trading_type.confidence_band();

        let mut required = vec![
            "action",
            "target_price",
            "stop_loss",
            "time_horizon",
            "entry_timing",
            "risk_level",
            "confidence_score",
            "summary",
            "risk_factors",
        ];
        let mut properties = json!({
            "action": {"type": "string", "enum": actions},
            "target_price": {"type": "number"},
            "stop_loss": {"type": "number"},
            "time_horizon": {"type": "string", "enum": horizons},
            "entry_timing": {"type": "string"},
            "risk_level": {"type": "string", "enum": ["low", "medium", "high"]},
            "position_sizing": {"type": "string", "description": "% portfolio allocation"},
            "confidence_score": {"type": "number", "description": format!("{lo}-{hi}")},
            "summary": {"type": "string"},
            "risk_factors": {"type": "array", "items": {"type": "string"}}
        });
        if !trading_type.needs_research() {
            properties["take_profit_levels"] = json!({
                "type": "array",
                "maxItems": 3,
                "items": {"type": "number"}
            });
            properties["risk_reward_ratio"] = json!({"type": "string"});
            properties["entry_zone_min"] = json!({"type": "number", "description": "lower bound of the entry zone"});
            properties["entry_zone_max"] = json!({"type": "number", "description": "upper bound of the entry zone"});
            required.push("entry_zone_min");
        }

        Self {
            name: Self::RECOMMENDATION,
            version: 1,
            description: "Final action decision combining every prior phase",
            schema: json!({
                "type": "object",
                "required": required,
                "properties": properties
            }),
        }
    }
}
