use crate::domain::asset::TradingType;
use crate::domain::contract::SchemaContract;
use crate::domain::reading::ChartReading;
use crate::llm::error::InferenceError;
use crate::llm::json::decode_phase;
use crate::llm::{InferenceClient, InferenceRequest};
use crate::pipeline::context::PipelineContext;

const PATTERN_LIBRARY: &str = "\
PATTERN LIBRARY:
- Candlesticks: doji (gravestone, dragonfly, long-legged), hammer, hanging man, inverted hammer, \
shooting star, spinning top, marubozu, engulfing, piercing, dark cloud cover, tweezers, harami, \
three white soldiers, three black crows, morning/evening star, abandoned baby
- Chart patterns: head & shoulders (and inverse), double/triple top/bottom, cup & handle, rounding \
top/bottom, ascending/descending/symmetrical triangles, flags, pennants, wedges, rectangles, \
diamonds, broadening formations, island reversals
- Advanced: harmonic patterns (Gartley, butterfly, bat, crab, cypher, ABCD), Elliott waves, \
Wyckoff accumulation/distribution, order blocks, fair value gaps, break of structure";

fn expertise(trading_type: TradingType) -> &'static str {
    match trading_type {
        TradingType::Spot => {
            "You are an institutional crypto spot trader. Spot trading is long-only: \
             focus on optimal BUY entry zones, whale accumulation, exchange flows and \
             Bitcoin-dominance correlation."
        }
        TradingType::Forex => {
            "You are an institutional forex trader. Signals may be BUY or SELL according \
             to market structure: rejection at resistance favors SELL, a bounce from support \
             favors BUY. Consider session overlaps, rate differentials and central-bank risk."
        }
        TradingType::Equities => {
            "You are a senior equity analyst for the Indonesia Stock Exchange (IDX). Read the \
             ticker code (BBCA, TLKM, GOTO, ...) from the chart, name the company and its \
             sector. Trading hours are 09:00-16:00 WIB; one lot is 100 shares."
        }
    }
}

fn prompt(ctx: &PipelineContext) -> String {
    let trading_type = ctx.trading_type();
    format!(
        "{expertise}\n\n\
This is a {trading_type} chart rendered as a {chart_type} chart.\n\n\
{PATTERN_LIBRARY}\n\n\
INSTRUCTIONS:\n\
1. Identify the instrument (symbol, name, sector) from the chart labels.\n\
2. Read exact price levels from the price axis, decimals included: current, high, low and change.\n\
3. Detect the timeframe from the chart UI (e.g. 5M, 1H, 1D, 1W).\n\
4. Determine the trend, the primary pattern, any secondary patterns and numeric support/resistance levels.\n\
5. Summarize RSI, MACD, moving averages, Bollinger Bands and stochastic if visible; analyze volume bars.\n\
6. Report your confidence between 85 and 98.",
        expertise = expertise(trading_type),
        chart_type = ctx.chart_type(),
    )
}

pub fn build_request(ctx: &PipelineContext) -> InferenceRequest {
    InferenceRequest::new(prompt(ctx), SchemaContract::chart_reading(ctx.trading_type()))
        .with_file(ctx.asset().url())
}

/// Phase 1. However sparse, a decodable reading is accepted as-is.
pub async fn read(
    client: &dyn InferenceClient,
    ctx: &PipelineContext,
) -> Result<ChartReading, InferenceError> {
    let raw = client.invoke(build_request(ctx)).await?;
    decode_phase(client.provider(), SchemaContract::CHART_READING, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::UploadedAsset;
    use crate::domain::validation::{ChartType, ValidationResult};
    use crate::llm::replay::ReplayClient;
    use serde_json::json;

    fn ctx(trading_type: TradingType) -> PipelineContext {
        PipelineContext::new(
            UploadedAsset::new("https://cdn.example.com/chart.png").unwrap(),
            trading_type,
        )
        .with_validation(ValidationResult {
            is_chart: true,
            chart_type: ChartType::Candlestick,
            reason: "candles with axes".to_string(),
        })
    }

    #[test]
    fn prompt_varies_with_trading_type() {
        let spot = build_request(&ctx(TradingType::Spot));
        let forex = build_request(&ctx(TradingType::Forex));
        let equities = build_request(&ctx(TradingType::Equities));
        assert!(spot.prompt.contains("long-only"));
        assert!(forex.prompt.contains("BUY or SELL"));
        assert!(equities.prompt.contains("IDX"));
        assert!(spot.prompt.contains("candlestick chart"));
        assert_eq!(equities.file_urls.len(), 1);
    }

    #[tokio::test]
    async fn sparse_reading_is_accepted() {
        let client = ReplayClient::new().with_response(
            SchemaContract::CHART_READING,
            json!({"instrument": {"symbol": "BBCA"}, "technical": {"trend": "bullish"}}),
        );
        let reading = read(&client, &ctx(TradingType::Equities)).await.unwrap();
        assert_eq!(reading.symbol(), Some("BBCA"));
        assert!(reading.timeframe.is_none());
    }
}
