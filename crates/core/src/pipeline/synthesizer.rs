use crate::domain::asset::TradingType;
use crate::domain::contract::SchemaContract;
use crate::domain::recommendation::RecommendationDraft;
use crate::llm::error::InferenceError;
use crate::llm::json::decode_phase;
use crate::llm::{InferenceClient, InferenceRequest};
use crate::pipeline::context::PipelineContext;
use serde_json::json;

// Decision criteria are guidance for the engine only; nothing here enforces them.
const EQUITY_CRITERIA: &str = "\
DECISION CRITERIA:
- STRONG_BUY: bullish technicals + excellent fundamentals + positive news
- BUY: acceptable technicals + good fundamentals + neutral/positive news
- HOLD: mixed signals, wait for confirmation
- SELL: bearish technicals + fundamental concerns
- STRONG_SELL: major red flags in both technicals and fundamentals
Also weigh liquidity (average volume), foreign ownership limits, dividend track record, \
management quality and the regulatory environment.";

const SPOT_CRITERIA: &str = "\
DECISION CRITERIA (spot, long-only):
- STRONG_BUY: strong bullish structure with at least three confluence factors
- BUY: bullish structure or a support bounce
- HOLD: range-bound or unclear structure; do not force an entry
Give an entry zone, a stop loss below structure and up to three take-profit levels.";

const FOREX_CRITERIA: &str = "\
DECISION CRITERIA (forex, two-sided):
- STRONG_BUY / BUY: bullish structure, support bounce or consolidation near support
- HOLD: no clear structure
- SELL / STRONG_SELL: bearish structure, resistance rejection or consolidation near resistance
Give an entry, a stop loss beyond structure and up to three take-profit levels.";

fn criteria(trading_type: TradingType) -> &'static str {
    match trading_type {
        TradingType::Spot => SPOT_CRITERIA,
        TradingType::Forex => FOREX_CRITERIA,
        TradingType::Equities => EQUITY_CRITERIA,
    }
}

fn prompt(ctx: &PipelineContext) -> String {
    let trading_type = ctx.trading_type();
    let (lo, hi) = trading_type.confidence_band();

    let mut combined = json!({
        "trading_type": trading_type,
        "chart_type": ctx.chart_type(),
        "technical": ctx.reading(),
    });
    if trading_type.needs_research() {
        combined["fundamental_and_news"] = json!(ctx.findings());
    }

    format!(
        "You are a senior portfolio manager producing the final recommendation.\n\n\
COMBINED ANALYSIS:\n{combined:#}\n\n\
TASKS:\n\
1. Decide the action from the combined technical{research} picture.\n\
2. Compute a target price and a stop loss.\n\
3. Describe the entry timing and the time horizon.\n\
4. Assess the risk level and list the main risk factors.\n\
5. Suggest a position size as a % of the portfolio.\n\
6. Write an executive summary and a final confidence between {lo} and {hi}.\n\n\
{criteria}",
        research = if trading_type.needs_research() {
            " + fundamental + news"
        } else {
            ""
        },
        criteria = criteria(trading_type),
    )
}

pub fn build_request(ctx: &PipelineContext) -> InferenceRequest {
    InferenceRequest::new(prompt(ctx), SchemaContract::recommendation(ctx.trading_type()))
}

/// Final inference phase. The confidence clamp is applied later, by the
/// result compiler.
pub async fn synthesize(
    client: &dyn InferenceClient,
    ctx: &PipelineContext,
) -> Result<RecommendationDraft, InferenceError> {
    let raw = client.invoke(build_request(ctx)).await?;
    decode_phase(client.provider(), SchemaContract::RECOMMENDATION, raw)
}
