use anyhow::Context;
use chartflow_core::domain::asset::TradingType;
use chartflow_core::llm::anthropic::AnthropicClient;
use chartflow_core::llm::replay::ReplayClient;
use chartflow_core::llm::InferenceClient;
use chartflow_core::pipeline::{PipelineController, PipelineError, PipelineOptions};
use chartflow_core::storage::{InMemoryRepository, PgRepository, Repository};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "chartflow_worker")]
struct Args {
    /// Public URL of the chart image to analyze.
    #[arg(long)]
    image_url: String,

    /// spot, forex or equities (aliases: crypto, fx, stock).
    #[arg(long, default_value = "spot")]
    trading_type: String,

    /// Answer every phase from a JSON fixture keyed by schema name instead of
    /// calling the inference API.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Keep the compiled record in memory instead of writing it to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = chartflow_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let trading_type: TradingType = args.trading_type.parse()?;

    let client: Arc<dyn InferenceClient> = match &args.replay {
        Some(path) => Arc::new(ReplayClient::from_file(path)?),
        None => Arc::new(AnthropicClient::from_settings(&settings)?),
    };

    let repo: Arc<dyn Repository> = if args.dry_run {
        Arc::new(InMemoryRepository::new())
    } else {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        chartflow_core::storage::migrate(&pool).await?;
        Arc::new(PgRepository::new(pool))
    };

    tracing::info!(
        image_url = %args.image_url,
        trading_type = trading_type.as_str(),
        provider = client.provider().as_str(),
        dry_run = args.dry_run,
        "starting analysis"
    );

    let mut pipeline =
        PipelineController::new(client, repo, PipelineOptions::from_settings(&settings));

    match pipeline.run(&args.image_url, trading_type).await {
        Ok(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(err) => {
            if let PipelineError::Failed { source, .. } = &err {
                if let Some(raw) = source
                    .raw_response_json
                    .clone()
                    .or_else(|| source.raw_output.clone().map(serde_json::Value::String))
                {
                    tracing::debug!(%raw, "raw inference output of the failed phase");
                }
            }
            let message = err.user_message();
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "analysis run failed");
            anyhow::bail!(message)
        }
    }
}

fn init_sentry(settings: &chartflow_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
