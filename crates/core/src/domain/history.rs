use crate::domain::asset::TradingType;
use crate::domain::recommendation::{Action, RiskLevel};
use crate::domain::record::CompiledAnalysisRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub const DEFAULT_HISTORY_LIMIT: u32 = 100;
pub const MAX_HISTORY_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRange {
    Today,
    Week,
    Month,
    #[default]
    All,
}

impl FromStr for HistoryRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(HistoryRange::Today),
            "week" => Ok(HistoryRange::Week),
            "month" => Ok(HistoryRange::Month),
            "all" | "" => Ok(HistoryRange::All),
            other => anyhow::bail!("unknown history range: {other}"),
        }
    }
}

/// Filter for reading back compiled analyses, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub trading_type: Option<TradingType>,
    pub risk_level: Option<RiskLevel>,
    pub action: Option<Action>,
    pub symbol: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<u32>,
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }

    pub fn normalized_symbol(&self) -> Option<String> {
        self.symbol
            .as_deref()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
    }

    pub fn matches(&self, record: &CompiledAnalysisRecord) -> bool {
        if let Some(t) = self.trading_type {
            if record.trading_type != t {
                return false;
            }
        }
        if let Some(r) = self.risk_level {
            if record.recommendation.risk_level != r {
                return false;
            }
        }
        if let Some(a) = self.action {
            if record.recommendation.action != a {
                return false;
            }
        }
        if let Some(symbol) = self.normalized_symbol() {
            if record.instrument.symbol.to_ascii_uppercase() != symbol {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total: usize,
    pub average_confidence: Option<f64>,
    pub by_action: BTreeMap<Action, usize>,
    pub by_trading_type: BTreeMap<TradingType, usize>,
}

impl HistorySummary {
    pub fn from_records(records: &[CompiledAnalysisRecord]) -> Self {
        let mut out = HistorySummary {
            total: records.len(),
            ..Default::default()
        };
        if records.is_empty() {
            return out;
        }

        let mut confidence_sum = 0.0;
        for r in records {
            confidence_sum += r.confidence_score;
            *out.by_action.entry(r.recommendation.action).or_default() += 1;
            *out.by_trading_type.entry(r.trading_type).or_default() += 1;
        }
        out.average_confidence = Some(confidence_sum / records.len() as f64);
        out
    }
}
