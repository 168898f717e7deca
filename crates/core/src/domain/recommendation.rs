use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::StrongBuy,
        Action::Buy,
        Action::Hold,
        Action::Sell,
        Action::StrongSell,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::StrongBuy => "STRONG_BUY",
            Action::Buy => "BUY",
            Action::Hold => "HOLD",
            Action::Sell => "SELL",
            Action::StrongSell => "STRONG_SELL",
        }
    }

    pub fn is_short(self) -> bool {
        matches!(self, Action::Sell | Action::StrongSell)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_uppercase();
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == needle)
            .ok_or_else(|| anyhow::anyhow!("unknown action: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeHorizon {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeHorizon {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeHorizon::ShortTerm => "short_term",
            TimeHorizon::MediumTerm => "medium_term",
            TimeHorizon::LongTerm => "long_term",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            other => anyhow::bail!("unknown risk level: {other}"),
        }
    }
}

/// Final phase output, as returned by the engine. Defaults and the
/// confidence clamp are applied by the result compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationDraft {
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    // Crypto and forex only.
    #[serde(default)]
    pub entry_zone_min: Option<f64>,
    #[serde(default)]
    pub entry_zone_max: Option<f64>,
    #[serde(default)]
    pub take_profit_levels: Option<Vec<f64>>,
    #[serde(default)]
    pub risk_reward_ratio: Option<String>,
    #[serde(default)]
    pub time_horizon: Option<TimeHorizon>,
    #[serde(default)]
    pub entry_timing: Option<String>,
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub position_sizing: Option<String>,
    #[serde(default, alias = "confidence")]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub risk_factors: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_uses_screaming_case_on_the_wire() {
        let draft: RecommendationDraft = serde_json::from_value(json!({
            "action": "STRONG_BUY",
            "time_horizon": "long_term",
        }))
        .unwrap();
        assert_eq!(draft.action, Some(Action::StrongBuy));
        assert_eq!(draft.time_horizon, Some(TimeHorizon::LongTerm));
        assert_eq!(draft.risk_level, None);
    }

    #[test]
    fn parses_action_and_risk_level_from_query_strings() {
        assert_eq!("strong_sell".parse::<Action>().unwrap(), Action::StrongSell);
        assert_eq!(" High ".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("MAYBE".parse::<Action>().is_err());
    }
}
