use serde::{Deserialize, Serialize};

/// Phase 2 output (equities path only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextFindings {
    #[serde(default)]
    pub news: Option<Vec<NewsItem>>,
    #[serde(default)]
    pub fundamentals: Option<FundamentalMetrics>,
    #[serde(default)]
    pub catalysts: Option<Vec<String>>,
    #[serde(default)]
    pub sector_outlook: Option<String>,
    #[serde(default)]
    pub market_sentiment: Option<MarketSentiment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub sentiment: Option<NewsSentiment>,
    #[serde(default)]
    pub impact_score: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    #[serde(default)]
    pub pe_ratio: Option<f64>,
    #[serde(default)]
    pub pbv_ratio: Option<f64>,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<String>,
    #[serde(default)]
    pub revenue_growth: Option<String>,
    #[serde(default)]
    pub profit_margin: Option<String>,
    #[serde(default)]
    pub debt_to_equity: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsSentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSentiment {
    VeryPositive,
    Positive,
    #[default]
    Neutral,
    Negative,
    VeryNegative,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_news_with_partial_items() {
        let findings: ContextFindings = serde_json::from_value(json!({
            "news": [
                {"headline": "Q3 earnings beat", "sentiment": "positive", "impact_score": 8},
                {"summary": "no headline here"},
            ],
            "market_sentiment": "very_positive",
        }))
        .unwrap();
        let news = findings.news.unwrap();
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].sentiment, Some(NewsSentiment::Positive));
        assert_eq!(news[0].impact_score, Some(8.0));
        assert_eq!(news[1].headline, None);
        assert_eq!(findings.market_sentiment, Some(MarketSentiment::VeryPositive));
    }
}
