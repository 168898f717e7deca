use crate::domain::history::HistoryQuery;
use crate::domain::record::CompiledAnalysisRecord;
use anyhow::Context;
use uuid::Uuid;

pub mod analyses;
pub mod memory;

pub use analyses::PgRepository;
pub use memory::InMemoryRepository;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Durable store for compiled analyses.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Stores the record. A record whose fingerprint is already stored is not
    /// inserted again; the stored one is returned instead.
    async fn create(&self, record: &CompiledAnalysisRecord) -> anyhow::Result<CompiledAnalysisRecord>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<CompiledAnalysisRecord>>;

    async fn list(&self, query: &HistoryQuery) -> anyhow::Result<Vec<CompiledAnalysisRecord>>;
}
