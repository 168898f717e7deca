use crate::domain::history::HistoryQuery;
use crate::domain::record::CompiledAnalysisRecord;
use crate::storage::Repository;
use anyhow::Context;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: sqlx::PgPool,
}

impl PgRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn decode_record(raw: Value) -> anyhow::Result<CompiledAnalysisRecord> {
    serde_json::from_value::<CompiledAnalysisRecord>(raw)
        .context("stored analysis record does not decode into CompiledAnalysisRecord")
}

#[async_trait::async_trait]
impl Repository for PgRepository {
    async fn create(&self, record: &CompiledAnalysisRecord) -> anyhow::Result<CompiledAnalysisRecord> {
        let body = serde_json::to_value(record).context("serialize analysis record failed")?;

        let inserted: Option<Value> = sqlx::query_scalar(
            "INSERT INTO analysis_records \
               (id, created_at, fingerprint, image_url, trading_type, symbol, action, risk_level, confidence_score, record) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (fingerprint) DO NOTHING \
             RETURNING record",
        )
        .persistent(false)
        .bind(record.id)
        .bind(record.created_at)
        .bind(&record.fingerprint)
        .bind(&record.image_url)
        .bind(record.trading_type.as_str())
        .bind(&record.instrument.symbol)
        .bind(record.recommendation.action.as_str())
        .bind(record.recommendation.risk_level.as_str())
        .bind(record.confidence_score)
        .bind(body)
        .fetch_optional(&self.pool)
        .await
        .context("insert analysis_records failed")?;

        if let Some(raw) = inserted {
            return decode_record(raw);
        }

        // Duplicate submission: hand back the row that won.
        let existing: Value = sqlx::query_scalar(
            "SELECT record FROM analysis_records WHERE fingerprint = $1",
        )
        .persistent(false)
        .bind(&record.fingerprint)
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!(
                "select existing analysis_records failed (fingerprint={})",
                record.fingerprint
            )
        })?;

        tracing::info!(
            fingerprint = %record.fingerprint,
            "duplicate analysis submission; returning stored record"
        );
        decode_record(existing)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<CompiledAnalysisRecord>> {
        let row: Option<Value> =
            sqlx::query_scalar("SELECT record FROM analysis_records WHERE id = $1")
                .persistent(false)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("select analysis_records failed (id={id})"))?;

        row.map(decode_record).transpose()
    }

    async fn list(&self, query: &HistoryQuery) -> anyhow::Result<Vec<CompiledAnalysisRecord>> {
        let mut qb = sqlx::QueryBuilder::new("SELECT record FROM analysis_records WHERE TRUE");
        if let Some(t) = query.trading_type {
            qb.push(" AND trading_type = ").push_bind(t.as_str());
        }
        if let Some(r) = query.risk_level {
            qb.push(" AND risk_level = ").push_bind(r.as_str());
        }
        if let Some(a) = query.action {
            qb.push(" AND action = ").push_bind(a.as_str());
        }
        if let Some(symbol) = query.normalized_symbol() {
            qb.push(" AND upper(symbol) = ").push_bind(symbol);
        }
        if let Some(since) = query.since {
            qb.push(" AND created_at >= ").push_bind(since);
        }
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(query.effective_limit()));

        let rows: Vec<Value> = qb
            .build_query_scalar()
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .context("select analysis_records history failed")?;

        rows.into_iter().map(decode_record).collect()
    }
}
