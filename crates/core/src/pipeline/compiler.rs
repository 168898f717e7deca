use crate::domain::asset::TradingType;
use crate::domain::reading::{ChartReading, IndicatorSnapshot, Trend};
use crate::domain::recommendation::{Action, RecommendationDraft, RiskLevel, TimeHorizon};
use crate::domain::record::{
    CompiledAnalysisRecord, FundamentalSummary, IndicatorSummary, InstrumentSummary, NewsSummary,
    PriceSummary, RecommendationSummary, ResearchSummary, TechnicalSummary,
};
use crate::domain::research::{ContextFindings, NewsItem};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::researcher::{UNKNOWN_NAME, UNKNOWN_SYMBOL};
use crate::pipeline::PipelineError;
use crate::storage::Repository;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const DEFAULT_SECTOR: &str = "Unknown Sector";
pub const DEFAULT_PATTERN: &str = "No clear pattern";
pub const NOT_AVAILABLE: &str = "Not available";
pub const NOT_SPECIFIED: &str = "Not specified";
pub const DEFAULT_ENTRY_TIMING: &str = "MARKET ORDER";
pub const DEFAULT_SUMMARY: &str = "Analysis summary not available";
pub const DEFAULT_SECTOR_OUTLOOK: &str = "No sector outlook available";
pub const DEFAULT_ACTION: Action = Action::Hold;
pub const DEFAULT_TIME_HORIZON: TimeHorizon = TimeHorizon::MediumTerm;
pub const DEFAULT_RISK_LEVEL: RiskLevel = RiskLevel::Medium;
pub const DEFAULT_TREND: Trend = Trend::Sideways;
pub const DEFAULT_NEWS_IMPACT: f64 = 5.0;
pub const NEWS_IMPACT_RANGE: (f64, f64) = (1.0, 10.0);

/// Clamps into the trading type's confidence band. Non-finite values are
/// treated as absent.
pub fn clamp_confidence(value: Option<f64>, trading_type: TradingType) -> f64 {
    let (lo, hi) = trading_type.confidence_band();
    value
        .filter(|v| v.is_finite())
        .unwrap_or_else(|| trading_type.fallback_confidence())
        .clamp(lo, hi)
}

fn text_or(value: Option<&String>, default: &str) -> String {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn strings(values: Option<&Vec<String>>) -> Vec<String> {
    values
        .map(|v| {
            v.iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn levels(values: Option<&Vec<f64>>) -> Vec<f64> {
    values
        .map(|v| v.iter().copied().filter(|x| x.is_finite()).collect())
        .unwrap_or_default()
}

fn compile_instrument(reading: &ChartReading) -> InstrumentSummary {
    let sector = reading.instrument.as_ref().and_then(|i| i.sector.as_ref());
    InstrumentSummary {
        symbol: reading.symbol().unwrap_or(UNKNOWN_SYMBOL).to_string(),
        name: reading.name().unwrap_or(UNKNOWN_NAME).to_string(),
        sector: text_or(sector, DEFAULT_SECTOR),
    }
}

fn compile_price(reading: &ChartReading) -> PriceSummary {
    let Some(p) = reading.price.as_ref() else {
        return PriceSummary::default();
    };
    PriceSummary {
        current: finite(p.current),
        high: finite(p.high),
        low: finite(p.low),
        change: finite(p.change),
        change_percent: finite(p.change_percent),
    }
}

fn compile_indicators(indicators: Option<&IndicatorSnapshot>) -> IndicatorSummary {
    let default = IndicatorSnapshot::default();
    let i = indicators.unwrap_or(&default);
    IndicatorSummary {
        rsi: text_or(i.rsi.as_ref(), NOT_AVAILABLE),
        macd: text_or(i.macd.as_ref(), NOT_AVAILABLE),
        moving_average: text_or(i.moving_average.as_ref(), NOT_AVAILABLE),
        bollinger_bands: text_or(i.bollinger_bands.as_ref(), NOT_AVAILABLE),
        stochastic: text_or(i.stochastic.as_ref(), NOT_AVAILABLE),
    }
}

fn compile_technical(reading: &ChartReading) -> TechnicalSummary {
    let Some(t) = reading.technical.as_ref() else {
        return TechnicalSummary {
            trend: DEFAULT_TREND,
            pattern: DEFAULT_PATTERN.to_string(),
            secondary_patterns: Vec::new(),
            support_levels: Vec::new(),
            resistance_levels: Vec::new(),
            indicators: compile_indicators(None),
            volume_analysis: NOT_AVAILABLE.to_string(),
            volume_confirmation: false,
            chart_quality_score: finite(reading.chart_quality_score),
        };
    };
    TechnicalSummary {
        trend: t.trend.unwrap_or(DEFAULT_TREND),
        pattern: text_or(t.pattern.as_ref(), DEFAULT_PATTERN),
        secondary_patterns: strings(t.secondary_patterns.as_ref()),
        support_levels: levels(t.support_levels.as_ref()),
        resistance_levels: levels(t.resistance_levels.as_ref()),
        indicators: compile_indicators(t.indicators.as_ref()),
        volume_analysis: text_or(t.volume_analysis.as_ref(), NOT_AVAILABLE),
        volume_confirmation: t.volume_confirmation.unwrap_or(false),
        chart_quality_score: finite(reading.chart_quality_score),
    }
}

fn compile_news(item: &NewsItem) -> NewsSummary {
    let (lo, hi) = NEWS_IMPACT_RANGE;
    NewsSummary {
        headline: text_or(item.headline.as_ref(), NOT_AVAILABLE),
        summary: text_or(item.summary.as_ref(), NOT_AVAILABLE),
        sentiment: item.sentiment.unwrap_or_default(),
        impact_score: finite(item.impact_score)
            .unwrap_or(DEFAULT_NEWS_IMPACT)
            .clamp(lo, hi),
        source: text_or(item.source.as_ref(), NOT_AVAILABLE),
        date: text_or(item.date.as_ref(), NOT_AVAILABLE),
    }
}

fn compile_research(findings: &ContextFindings) -> ResearchSummary {
    let fundamentals = findings
        .fundamentals
        .as_ref()
        .map(|f| FundamentalSummary {
            pe_ratio: finite(f.pe_ratio),
            pbv_ratio: finite(f.pbv_ratio),
            dividend_yield: finite(f.dividend_yield),
            market_cap: f.market_cap.clone(),
            revenue_growth: f.revenue_growth.clone(),
            profit_margin: f.profit_margin.clone(),
            debt_to_equity: finite(f.debt_to_equity),
        })
        .unwrap_or_default();

    ResearchSummary {
        news: findings
            .news
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(compile_news)
            .collect(),
        fundamentals,
        catalysts: strings(findings.catalysts.as_ref()),
        sector_outlook: text_or(findings.sector_outlook.as_ref(), DEFAULT_SECTOR_OUTLOOK),
        market_sentiment: findings.market_sentiment.unwrap_or_default(),
    }
}

/// Entry is the low end of the zone, then its high end, then the price the
/// chart was read at. Equities drafts carry no entry zone.
fn entry_price(
    draft: &RecommendationDraft,
    reading: &ChartReading,
    trading_type: TradingType,
) -> Option<f64> {
    if trading_type.needs_research() {
        return None;
    }
    finite(draft.entry_zone_min)
        .or(finite(draft.entry_zone_max))
        .or_else(|| finite(reading.price.as_ref().and_then(|p| p.current)))
}

fn compile_recommendation(
    draft: &RecommendationDraft,
    reading: &ChartReading,
    trading_type: TradingType,
) -> RecommendationSummary {
    let entry_zone_max = if trading_type.needs_research() {
        None
    } else {
        finite(draft.entry_zone_max)
    };
    RecommendationSummary {
        action: draft.action.unwrap_or(DEFAULT_ACTION),
        entry_price: entry_price(draft, reading, trading_type),
        entry_zone_max,
        target_price: finite(draft.target_price),
        stop_loss: finite(draft.stop_loss),
        take_profit_levels: levels(draft.take_profit_levels.as_ref()),
        risk_reward_ratio: text_or(draft.risk_reward_ratio.as_ref(), NOT_SPECIFIED),
        time_horizon: draft.time_horizon.unwrap_or(DEFAULT_TIME_HORIZON),
        entry_timing: text_or(draft.entry_timing.as_ref(), DEFAULT_ENTRY_TIMING),
        risk_level: draft.risk_level.unwrap_or(DEFAULT_RISK_LEVEL),
        position_sizing: text_or(draft.position_sizing.as_ref(), NOT_SPECIFIED),
        summary: text_or(draft.summary.as_ref(), DEFAULT_SUMMARY),
        risk_factors: strings(draft.risk_factors.as_ref()),
    }
}

/// Hash of the asset and every phase output. Identical inputs always give
/// the same fingerprint.
pub fn fingerprint(
    ctx: &PipelineContext,
    draft: &RecommendationDraft,
) -> Result<String, PipelineError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ctx.asset().url().as_bytes());
    hasher.update(&[0]);
    hasher.update(ctx.trading_type().as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(ctx.chart_type().as_str().as_bytes());

    let parts = [
        serde_json::to_vec(&ctx.reading()),
        serde_json::to_vec(&ctx.findings()),
        serde_json::to_vec(draft),
    ];
    for part in parts {
        let bytes = part.map_err(|e| PipelineError::Incomplete {
            missing: "serializable phase output",
            detail: e.to_string(),
        })?;
        hasher.update(&[0]);
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Single defaulting boundary of the pipeline: every absent optional field
/// of every phase output gets its documented default here, and nowhere else.
pub fn compile(
    ctx: &PipelineContext,
    draft: &RecommendationDraft,
    now: DateTime<Utc>,
) -> Result<CompiledAnalysisRecord, PipelineError> {
    let trading_type = ctx.trading_type();
    let reading = ctx.reading().ok_or_else(|| PipelineError::Incomplete {
        missing: "chart reading",
        detail: "compilation reached without a chart reading".to_string(),
    })?;
    let research = if trading_type.needs_research() {
        let findings = ctx.findings().ok_or_else(|| PipelineError::Incomplete {
            missing: "context findings",
            detail: "equities compilation reached without research findings".to_string(),
        })?;
        Some(compile_research(findings))
    } else {
        None
    };

    let confidence_score = clamp_confidence(
        finite(draft.confidence_score).or(finite(reading.confidence)),
        trading_type,
    );

    Ok(CompiledAnalysisRecord {
        id: Uuid::new_v4(),
        created_at: now,
        fingerprint: fingerprint(ctx, draft)?,
        image_url: ctx.asset().url().to_string(),
        trading_type,
        chart_type: ctx.chart_type(),
        instrument: compile_instrument(reading),
        price: compile_price(reading),
        timeframe: text_or(reading.timeframe.as_ref(), trading_type.default_timeframe()),
        technical: compile_technical(reading),
        research,
        recommendation: compile_recommendation(draft, reading, trading_type),
        confidence_score,
        reading_confidence: finite(reading.confidence),
    })
}

/// Hands the record to the repository in one create call.
pub async fn submit(
    repo: &dyn Repository,
    record: &CompiledAnalysisRecord,
) -> Result<CompiledAnalysisRecord, PipelineError> {
    repo.create(record).await.map_err(PipelineError::Persistence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::UploadedAsset;
    use crate::domain::reading::{Instrument, TechnicalFacts};
    use crate::domain::research::{MarketSentiment, NewsSentiment};
    use crate::domain::validation::{ChartType, ValidationResult};
    use crate::storage::InMemoryRepository;
    use chrono::TimeZone;
    use serde_json::json;

    fn ctx(trading_type: TradingType) -> PipelineContext {
        PipelineContext::new(
            UploadedAsset::new("https://cdn.example.com/chart.png").unwrap(),
            trading_type,
        )
        .with_validation(ValidationResult {
            is_chart: true,
            chart_type: ChartType::Candlestick,
            reason: "candles".to_string(),
        })
        .with_reading(ChartReading {
            instrument: Some(Instrument {
                symbol: Some("BBCA".to_string()),
                ..Default::default()
            }),
            technical: Some(TechnicalFacts {
                trend: Some(Trend::Bullish),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn equities_ctx() -> PipelineContext {
        ctx(TradingType::Equities).with_findings(ContextFindings::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap()
    }

    #[test]
    fn clamps_confidence_into_equities_band() {
        assert_eq!(clamp_confidence(Some(60.0), TradingType::Equities), 88.0);
        assert_eq!(clamp_confidence(Some(150.0), TradingType::Equities), 97.0);
        assert_eq!(clamp_confidence(Some(93.5), TradingType::Equities), 93.5);
        assert_eq!(clamp_confidence(None, TradingType::Equities), 90.0);
        assert_eq!(clamp_confidence(Some(f64::NAN), TradingType::Equities), 90.0);
    }

    #[test]
    fn clamps_confidence_into_crypto_band() {
        assert_eq!(clamp_confidence(Some(10.0), TradingType::Spot), 92.0);
        assert_eq!(clamp_confidence(Some(100.0), TradingType::Forex), 99.0);
        assert_eq!(clamp_confidence(None, TradingType::Forex), 95.0);
    }

    #[test]
    fn missing_risk_level_defaults_to_medium() {
        let draft: RecommendationDraft =
            serde_json::from_value(json!({"action": "SELL", "confidence_score": 91})).unwrap();
        let record = compile(&equities_ctx(), &draft, now()).unwrap();
        assert_eq!(record.recommendation.risk_level, RiskLevel::Medium);
        assert_eq!(record.recommendation.time_horizon, TimeHorizon::MediumTerm);
        assert_eq!(record.recommendation.entry_timing, "MARKET ORDER");
        assert_eq!(record.recommendation.action, Action::Sell);
        assert_eq!(record.confidence_score, 91.0);
    }

    #[test]
    fn empty_outputs_compile_to_documented_defaults() {
        let ctx = PipelineContext::new(
            UploadedAsset::new("https://cdn.example.com/x.png").unwrap(),
            TradingType::Equities,
        )
        .with_reading(ChartReading::default())
        .with_findings(ContextFindings {
            news: Some(vec![NewsItem {
                impact_score: Some(42.0),
                ..Default::default()
            }]),
            ..Default::default()
        });
        let record = compile(&ctx, &RecommendationDraft::default(), now()).unwrap();

        assert_eq!(record.instrument.symbol, "UNKNOWN");
        assert_eq!(record.instrument.name, "Unknown Instrument");
        assert_eq!(record.instrument.sector, "Unknown Sector");
        assert_eq!(record.timeframe, "1D");
        assert_eq!(record.technical.trend, Trend::Sideways);
        assert_eq!(record.technical.pattern, "No clear pattern");
        assert_eq!(record.technical.indicators.rsi, "Not available");
        assert_eq!(record.recommendation.action, Action::Hold);
        assert_eq!(record.recommendation.summary, "Analysis summary not available");
        assert!(record.recommendation.risk_factors.is_empty());
        assert_eq!(record.confidence_score, 90.0);
        assert_eq!(record.chart_type, ChartType::None);

        let research = record.research.unwrap();
        assert_eq!(research.market_sentiment, MarketSentiment::Neutral);
        assert_eq!(research.sector_outlook, "No sector outlook available");
        assert_eq!(research.news[0].impact_score, 10.0);
        assert_eq!(research.news[0].sentiment, NewsSentiment::Neutral);
        assert_eq!(research.news[0].headline, "Not available");
    }

    #[test]
    fn crypto_record_has_no_research_and_uses_reading_confidence() {
        let ctx = ctx(TradingType::Spot).with_reading(ChartReading {
            confidence: Some(97.0),
            ..Default::default()
        });
        let record = compile(&ctx, &RecommendationDraft::default(), now()).unwrap();
        assert!(record.research.is_none());
        assert_eq!(record.confidence_score, 97.0);
        assert_eq!(record.timeframe, "5M");
        assert_eq!(record.recommendation.risk_reward_ratio, "Not specified");
    }

    #[test]
    fn equities_without_findings_is_incomplete() {
        let err = compile(&ctx(TradingType::Equities), &RecommendationDraft::default(), now())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Incomplete { .. }));
    }

    #[test]
    fn compiling_twice_differs_only_in_identity() {
        let draft: RecommendationDraft =
            serde_json::from_value(json!({"action": "BUY", "confidence_score": 150})).unwrap();
        let a = compile(&equities_ctx(), &draft, now()).unwrap();
        let b = compile(&equities_ctx(), &draft, Utc::now()).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.without_identity(), b.without_identity());
        assert_eq!(a.confidence_score, 97.0);
    }

    #[test]
    fn fingerprint_changes_with_phase_outputs() {
        let buy: RecommendationDraft = serde_json::from_value(json!({"action": "BUY"})).unwrap();
        let hold: RecommendationDraft = serde_json::from_value(json!({"action": "HOLD"})).unwrap();
        let ctx = equities_ctx();
        assert_ne!(
            fingerprint(&ctx, &buy).unwrap(),
            fingerprint(&ctx, &hold).unwrap()
        );
    }

    #[test]
    fn crypto_entry_comes_from_the_zone_then_the_read_price() {
        let ctx = ctx(TradingType::Forex);
        let draft: RecommendationDraft = serde_json::from_value(json!({
            "action": "SELL",
            "entry_zone_min": 1.0842,
            "entry_zone_max": 1.0851,
            "stop_loss": 1.0880,
            "take_profit_levels": [1.0810, 1.0790]
        }))
        .unwrap();
        let record = compile(&ctx, &draft, now()).unwrap();
        assert_eq!(record.recommendation.entry_price, Some(1.0842));
        assert_eq!(record.recommendation.entry_zone_max, Some(1.0851));
        assert_eq!(record.recommendation.take_profit_levels, vec![1.0810, 1.0790]);

        let ctx = ctx.with_reading(
            serde_json::from_value(json!({"price": {"current": 64250.5}})).unwrap(),
        );
        let record = compile(&ctx, &RecommendationDraft::default(), now()).unwrap();
        assert_eq!(record.recommendation.entry_price, Some(64250.5));
        assert_eq!(record.recommendation.entry_zone_max, None);
    }

    #[test]
    fn equities_record_has_no_entry_zone() {
        let draft: RecommendationDraft =
            serde_json::from_value(json!({"entry_zone_min": 9100, "target_price": 9800})).unwrap();
        let record = compile(&equities_ctx(), &draft, now()).unwrap();
        assert_eq!(record.recommendation.entry_price, None);
        assert_eq!(record.recommendation.target_price, Some(9800.0));
    }

    #[test]
    fn reading_quality_and_raw_confidence_are_kept() {
        let ctx = ctx(TradingType::Spot).with_reading(
            serde_json::from_value(json!({"chart_quality_score": 77, "confidence": 86})).unwrap(),
        );
        let record = compile(&ctx, &RecommendationDraft::default(), now()).unwrap();
        assert_eq!(record.technical.chart_quality_score, Some(77.0));
        assert_eq!(record.reading_confidence, Some(86.0));
        assert_eq!(record.confidence_score, 92.0);

        let body = serde_json::to_value(&record).unwrap();
        assert_eq!(body["technical"]["chart_quality_score"], json!(77.0));
        assert_eq!(body["reading_confidence"], json!(86.0));
    }

    #[test]
    fn confidence_key_is_accepted_for_the_final_score() {
        let draft: RecommendationDraft =
            serde_json::from_value(json!({"action": "BUY", "confidence": 150})).unwrap();
        let record = compile(&equities_ctx(), &draft, now()).unwrap();
        assert_eq!(record.confidence_score, 97.0);
    }

    #[tokio::test]
    async fn duplicate_submission_is_stored_once() {
        let repo = InMemoryRepository::new();
        let draft = RecommendationDraft::default();
        let first = compile(&equities_ctx(), &draft, now()).unwrap();
        let second = compile(&equities_ctx(), &draft, now()).unwrap();

        let stored_first = submit(&repo, &first).await.unwrap();
        let stored_second = submit(&repo, &second).await.unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(stored_first.id, stored_second.id);
        assert_eq!(stored_second.id, first.id);
    }
}
