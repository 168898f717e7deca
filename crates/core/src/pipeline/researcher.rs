use crate::domain::contract::SchemaContract;
use crate::domain::reading::ChartReading;
use crate::domain::research::ContextFindings;
use crate::llm::error::InferenceError;
use crate::llm::json::decode_phase;
use crate::llm::{InferenceClient, InferenceRequest};

pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";
pub const UNKNOWN_NAME: &str = "Unknown Instrument";

fn prompt(reading: &ChartReading) -> String {
    let symbol = reading.symbol().unwrap_or(UNKNOWN_SYMBOL);
    let name = reading.name().unwrap_or(UNKNOWN_NAME);
    format!(
        "You are a fundamental analyst and news researcher for Indonesian equities.\n\n\
STOCK: {symbol}\n\
COMPANY: {name}\n\n\
RESEARCH TASKS:\n\
1. Recent news: find news from the last 7 days that affects this stock. For each item give \
headline, summary, sentiment, an impact score from 1 to 10, source and date.\n\
2. Fundamentals: estimate PE, PBV, dividend yield, market cap, revenue growth, profit margin \
and debt to equity.\n\
3. Catalysts: list the factors that could move the price.\n\
4. Sector outlook and overall market sentiment for the stock.\n\n\
Relevant news includes financial reports, acquisitions, expansions, mergers, regulation, \
management changes, dividend announcements, stock splits and rights issues. \
Use web search for current data."
    )
}

/// The request is parameterized only by the chart reading; no image is sent.
pub fn build_request(reading: &ChartReading) -> InferenceRequest {
    InferenceRequest::new(prompt(reading), SchemaContract::context_research()).with_external_context()
}

/// Phase 2, equities path only.
pub async fn research(
    client: &dyn InferenceClient,
    reading: &ChartReading,
) -> Result<ContextFindings, InferenceError> {
    let raw = client.invoke(build_request(reading)).await?;
    decode_phase(client.provider(), SchemaContract::CONTEXT_RESEARCH, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reading::Instrument;

    #[test]
    fn request_embeds_symbol_and_uses_external_context() {
        let reading = ChartReading {
            instrument: Some(Instrument {
                symbol: Some("TLKM".to_string()),
                name: Some("Telkom Indonesia".to_string()),
                sector: None,
            }),
            ..Default::default()
        };
        let req = build_request(&reading);
        assert!(req.prompt.contains("STOCK: TLKM"));
        assert!(req.prompt.contains("COMPANY: Telkom Indonesia"));
        assert!(req.use_external_context);
        assert!(req.file_urls.is_empty());
    }

    #[test]
    fn unknown_instrument_falls_back_to_placeholders() {
        let req = build_request(&ChartReading::default());
        assert!(req.prompt.contains("STOCK: UNKNOWN"));
        assert!(req.prompt.contains("COMPANY: Unknown Instrument"));
    }
}
