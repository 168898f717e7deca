use crate::domain::asset::TradingType;
use crate::domain::reading::Trend;
use crate::domain::recommendation::{Action, RiskLevel, TimeHorizon};
use crate::domain::research::{MarketSentiment, NewsSentiment};
use crate::domain::validation::ChartType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only entity a pipeline run persists. Built by the result compiler,
/// so every non-nullable field always carries a value or its documented
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAnalysisRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Stable hash of the asset and every phase output; used as the
    /// idempotency key on create.
    pub fingerprint: String,
    pub image_url: String,
    pub trading_type: TradingType,
    pub chart_type: ChartType,
    pub instrument: InstrumentSummary,
    pub price: PriceSummary,
    pub timeframe: String,
    pub technical: TechnicalSummary,
    /// Present iff the run took the equities path.
    pub research: Option<ResearchSummary>,
    pub recommendation: RecommendationSummary,
    pub confidence_score: f64,
    /// Phase-1 confidence as reported, before any clamping.
    pub reading_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSummary {
    pub symbol: String,
    pub name: String,
    pub sector: String,
}

// Price facts are nullable by contract: a chart may not show them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub current: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSummary {
    pub trend: Trend,
    pub pattern: String,
    pub secondary_patterns: Vec<String>,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub indicators: IndicatorSummary,
    pub volume_analysis: String,
    pub volume_confirmation: bool,
    pub chart_quality_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSummary {
    pub rsi: String,
    pub macd: String,
    pub moving_average: String,
    pub bollinger_bands: String,
    pub stochastic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSummary {
    pub news: Vec<NewsSummary>,
    pub fundamentals: FundamentalSummary,
    pub catalysts: Vec<String>,
    pub sector_outlook: String,
    pub market_sentiment: MarketSentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSummary {
    pub headline: String,
    pub summary: String,
    pub sentiment: NewsSentiment,
    pub impact_score: f64,
    pub source: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSummary {
    pub pe_ratio: Option<f64>,
    pub pbv_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub market_cap: Option<String>,
    pub revenue_growth: Option<String>,
    pub profit_margin: Option<String>,
    pub debt_to_equity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSummary {
    pub action: Action,
    pub entry_price: Option<f64>,
    pub entry_zone_max: Option<f64>,
    pub target_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit_levels: Vec<f64>,
    pub risk_reward_ratio: String,
    pub time_horizon: TimeHorizon,
    pub entry_timing: String,
    pub risk_level: RiskLevel,
    pub position_sizing: String,
    pub summary: String,
    pub risk_factors: Vec<String>,
}

impl CompiledAnalysisRecord {
    /// Same record with the per-submission identifiers blanked out; two
    /// compilations of the same phase outputs compare equal through this.
    pub fn without_identity(&self) -> Self {
        Self {
            id: Uuid::nil(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            ..self.clone()
        }
    }
}
