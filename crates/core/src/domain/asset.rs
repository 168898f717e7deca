use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to the chart image handed over by the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    url: String,
}

impl UploadedAsset {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let url = url.into().trim().to_string();
        ensure!(!url.is_empty(), "uploaded asset url must be non-empty");
        Ok(Self { url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for UploadedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradingType {
    Spot,
    Forex,
    Equities,
}

impl TradingType {
    pub const ALL: [TradingType; 3] = [TradingType::Spot, TradingType::Forex, TradingType::Equities];

    pub fn as_str(self) -> &'static str {
        match self {
            TradingType::Spot => "spot",
            TradingType::Forex => "forex",
            TradingType::Equities => "equities",
        }
    }

    /// Only the equities path runs the context research phase.
    pub fn needs_research(self) -> bool {
        matches!(self, TradingType::Equities)
    }

    /// Closed interval the compiled confidence score is clamped into.
    pub fn confidence_band(self) -> (f64, f64) {
        match self {
            TradingType::Spot | TradingType::Forex => (92.0, 99.0),
            TradingType::Equities => (88.0, 97.0),
        }
    }

    /// Used when neither the synthesizer nor the chart reading reports a confidence.
    pub fn fallback_confidence(self) -> f64 {
        match self {
            TradingType::Spot | TradingType::Forex => 95.0,
            TradingType::Equities => 90.0,
        }
    }

    pub fn default_timeframe(self) -> &'static str {
        match self {
            TradingType::Spot | TradingType::Forex => "5M",
            TradingType::Equities => "1D",
        }
    }

    /// Spot crypto has no short side.
    pub fn allows_short(self) -> bool {
        !matches!(self, TradingType::Spot)
    }
}

impl fmt::Display for TradingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradingType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spot" | "crypto" => Ok(TradingType::Spot),
            "forex" | "fx" => Ok(TradingType::Forex),
            "equities" | "equity" | "stock" | "stocks" => Ok(TradingType::Equities),
            other => {
                let known: Vec<&str> = TradingType::ALL.into_iter().map(TradingType::as_str).collect();
                anyhow::bail!("unknown trading type: {other} (expected one of {})", known.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_url() {
        assert!(UploadedAsset::new("   ").is_err());
        let asset = UploadedAsset::new(" https://cdn.example.com/chart.png ").unwrap();
        assert_eq!(asset.url(), "https://cdn.example.com/chart.png");
    }

    #[test]
    fn parses_trading_type_aliases() {
        assert_eq!("stock".parse::<TradingType>().unwrap(), TradingType::Equities);
        assert_eq!("FOREX".parse::<TradingType>().unwrap(), TradingType::Forex);
        assert_eq!("crypto".parse::<TradingType>().unwrap(), TradingType::Spot);
        let err = "futures".parse::<TradingType>().unwrap_err();
        assert!(err.to_string().contains("spot, forex, equities"));
    }

    #[test]
    fn only_equities_runs_research() {
        assert!(TradingType::Equities.needs_research());
        assert!(!TradingType::Spot.needs_research());
        assert!(!TradingType::Forex.needs_research());
    }
}
