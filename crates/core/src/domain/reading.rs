use serde::{Deserialize, Serialize};
use std::fmt;

// Phase 1 output. Everything is optional on the wire; defaults are applied
// only by the result compiler.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Sideways => "sideways",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartReading {
    #[serde(default)]
    pub instrument: Option<Instrument>,
    #[serde(default)]
    pub price: Option<PriceFacts>,
    #[serde(default)]
    pub technical: Option<TechnicalFacts>,
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub chart_quality_score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceFacts {
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalFacts {
    #[serde(default)]
    pub trend: Option<Trend>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub secondary_patterns: Option<Vec<String>>,
    #[serde(default)]
    pub support_levels: Option<Vec<f64>>,
    #[serde(default)]
    pub resistance_levels: Option<Vec<f64>>,
    #[serde(default)]
    pub indicators: Option<IndicatorSnapshot>,
    #[serde(default)]
    pub volume_analysis: Option<String>,
    #[serde(default)]
    pub volume_confirmation: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    #[serde(default)]
    pub rsi: Option<String>,
    #[serde(default)]
    pub macd: Option<String>,
    #[serde(default)]
    pub moving_average: Option<String>,
    #[serde(default)]
    pub bollinger_bands: Option<String>,
    #[serde(default)]
    pub stochastic: Option<String>,
}

impl ChartReading {
    pub fn symbol(&self) -> Option<&str> {
        self.instrument
            .as_ref()
            .and_then(|i| i.symbol.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.instrument
            .as_ref()
            .and_then(|i| i.name.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn trend(&self) -> Option<Trend> {
        self.technical.as_ref().and_then(|t| t.trend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_reading_decodes() {
        let reading: ChartReading = serde_json::from_value(json!({
            "instrument": {"symbol": "BBCA"},
            "technical": {"trend": "bullish"},
        }))
        .unwrap();
        assert_eq!(reading.symbol(), Some("BBCA"));
        assert_eq!(reading.trend(), Some(Trend::Bullish));
        assert!(reading.price.is_none());
        assert!(reading.confidence.is_none());
    }

    #[test]
    fn unknown_trend_is_a_decode_error() {
        let res = serde_json::from_value::<ChartReading>(json!({
            "technical": {"trend": "sideways-ish"},
        }));
        assert!(res.is_err());
    }

    #[test]
    fn blank_symbol_counts_as_absent() {
        let reading: ChartReading = serde_json::from_value(json!({
            "instrument": {"symbol": "  ", "name": "Bank Central Asia"},
        }))
        .unwrap();
        assert_eq!(reading.symbol(), None);
        assert_eq!(reading.name(), Some("Bank Central Asia"));
    }
}
