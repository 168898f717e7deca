use crate::domain::history::HistoryQuery;
use crate::domain::record::CompiledAnalysisRecord;
use crate::storage::Repository;
use std::sync::Mutex;
use uuid::Uuid;

/// Process-local repository with the same create/list semantics as the
/// Postgres one. Backs `--dry-run` runs.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: Mutex<Vec<CompiledAnalysisRecord>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory repository lock poisoned")
}

#[async_trait::async_trait]
impl Repository for InMemoryRepository {
    async fn create(&self, record: &CompiledAnalysisRecord) -> anyhow::Result<CompiledAnalysisRecord> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        if let Some(existing) = records
            .iter()
            .find(|r| r.fingerprint == record.fingerprint)
        {
            return Ok(existing.clone());
        }
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<CompiledAnalysisRecord>> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn list(&self, query: &HistoryQuery) -> anyhow::Result<Vec<CompiledAnalysisRecord>> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        let mut out: Vec<_> = records.iter().filter(|r| query.matches(r)).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(query.effective_limit() as usize);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::{TradingType, UploadedAsset};
    use crate::domain::reading::ChartReading;
    use crate::domain::recommendation::{Action, RecommendationDraft};
    use crate::domain::research::ContextFindings;
    use crate::pipeline::compiler::compile;
    use crate::pipeline::context::PipelineContext;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn record(url: &str, trading_type: TradingType, action: &str, hours_ago: i64) -> CompiledAnalysisRecord {
        let mut ctx = PipelineContext::new(UploadedAsset::new(url).unwrap(), trading_type)
            .with_reading(
                serde_json::from_value::<ChartReading>(json!({"instrument": {"symbol": "bbca"}}))
                    .unwrap(),
            );
        if trading_type.needs_research() {
            ctx = ctx.with_findings(ContextFindings::default());
        }
        let draft: RecommendationDraft = serde_json::from_value(json!({"action": action})).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        compile(&ctx, &draft, now - Duration::hours(hours_ago)).unwrap()
    }

    #[tokio::test]
    async fn lists_newest_first_with_filters_and_limit() {
        let repo = InMemoryRepository::new();
        repo.create(&record("https://x/1.png", TradingType::Equities, "BUY", 30)).await.unwrap();
        repo.create(&record("https://x/2.png", TradingType::Spot, "BUY", 1)).await.unwrap();
        repo.create(&record("https://x/3.png", TradingType::Equities, "SELL", 2)).await.unwrap();
        repo.create(&record("https://x/4.png", TradingType::Equities, "BUY", 5)).await.unwrap();

        let all = repo.list(&HistoryQuery::default()).await.unwrap();
        let urls: Vec<_> = all.iter().map(|r| r.image_url.as_str()).collect();
        assert_eq!(urls, ["https://x/2.png", "https://x/3.png", "https://x/4.png", "https://x/1.png"]);

        let buys = repo
            .list(&HistoryQuery {
                trading_type: Some(TradingType::Equities),
                action: Some(Action::Buy),
                symbol: Some(" BBCA ".to_string()),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].image_url, "https://x/4.png");

        let recent = repo
            .list(&HistoryQuery {
                since: Some(Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn create_is_idempotent_on_fingerprint() {
        let repo = InMemoryRepository::new();
        let first = record("https://x/1.png", TradingType::Forex, "SELL", 0);
        let again = record("https://x/1.png", TradingType::Forex, "SELL", 0);
        assert_ne!(first.id, again.id);

        repo.create(&first).await.unwrap();
        let stored = repo.create(&again).await.unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.get(first.id).await.unwrap(), Some(first));
        assert_eq!(repo.get(again.id).await.unwrap(), None);
    }
}
