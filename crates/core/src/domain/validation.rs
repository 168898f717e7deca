use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Candlestick,
    Line,
    Bar,
    None,
}

impl ChartType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartType::Candlestick => "candlestick",
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::None => "none",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the classification gate. Every field is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_chart: bool,
    pub chart_type: ChartType,
    pub reason: String,
}

impl ValidationResult {
    pub fn accepts(&self) -> bool {
        self.is_chart && self.chart_type != ChartType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn none_chart_type_is_rejected_even_when_flagged_as_chart() {
        let v: ValidationResult = serde_json::from_value(json!({
            "is_chart": true,
            "chart_type": "none",
            "reason": "axes only",
        }))
        .unwrap();
        assert!(!v.accepts());
    }

    #[test]
    fn missing_reason_fails_to_decode() {
        let res = serde_json::from_value::<ValidationResult>(json!({
            "is_chart": true,
            "chart_type": "line",
        }));
        assert!(res.is_err());
    }
}
