use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use chartflow_core::domain::asset::TradingType;
use chartflow_core::domain::history::{HistoryQuery, HistoryRange, HistorySummary};
use chartflow_core::domain::record::CompiledAnalysisRecord;
use chartflow_core::llm::anthropic::AnthropicClient;
use chartflow_core::llm::InferenceClient;
use chartflow_core::pipeline::{PipelineController, PipelineError, PipelineOptions};
use chartflow_core::storage::{PgRepository, Repository};

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

    let repo: Option<Arc<dyn Repository>> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match chartflow_core::storage::migrate(&pool).await {
                Ok(()) => Some(Arc::new(PgRepository::new(pool))),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let client: Option<Arc<dyn InferenceClient>> = match AnthropicClient::from_settings(&settings) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::error!(error = %e, "inference client unavailable; analyses are disabled");
            None
        }
    };

    let state = AppState {
        repo,
        client,
        options: PipelineOptions::from_settings(&settings),
        utc_offset_hours: settings.history_utc_offset_hours,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/analyses", get(list_analyses).post(create_analysis))
        .route("/analyses/summary", get(summarize_analyses))
        .route("/analyses/:id", get(get_analysis))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    repo: Option<Arc<dyn Repository>>,
    client: Option<Arc<dyn InferenceClient>>,
    options: PipelineOptions,
    utc_offset_hours: i32,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn unavailable() -> ApiError {
    api_error(StatusCode::SERVICE_UNAVAILABLE, "service unavailable")
}

fn internal(e: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&e);
    tracing::error!(error = %e, "request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

#[derive(Debug, Deserialize)]
struct CreateAnalysis {
    image_url: String,
    trading_type: String,
}

async fn create_analysis(
    State(state): State<AppState>,
    Json(body): Json<CreateAnalysis>,
) -> Result<(StatusCode, Json<CompiledAnalysisRecord>), ApiError> {
    let (Some(repo), Some(client)) = (state.repo.clone(), state.client.clone()) else {
        return Err(unavailable());
    };
    let trading_type: TradingType = body
        .trading_type
        .parse()
        .map_err(|e: anyhow::Error| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let mut pipeline = PipelineController::new(client, repo, state.options);
    match pipeline.run(&body.image_url, trading_type).await {
        Ok(record) => Ok((StatusCode::CREATED, Json(record))),
        Err(err) => {
            let status = match &err {
                PipelineError::InvalidAsset(_) | PipelineError::Rejected { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::Failed { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::Persistence(_)
                | PipelineError::IllegalTransition { .. }
                | PipelineError::Incomplete { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status != StatusCode::UNPROCESSABLE_ENTITY {
                let message = err.user_message();
                sentry_anyhow::capture_anyhow(&anyhow::Error::new(err));
                return Err(api_error(status, message));
            }
            Err(api_error(status, err.user_message()))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HistoryParams {
    trading_type: Option<String>,
    risk_level: Option<String>,
    action: Option<String>,
    symbol: Option<String>,
    range: Option<String>,
    limit: Option<u32>,
}

fn parse_param<T>(value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

fn history_query(params: &HistoryParams, utc_offset_hours: i32) -> Result<HistoryQuery, ApiError> {
    let range = parse_param::<HistoryRange>(params.range.as_deref())?.unwrap_or_default();
    let since = chartflow_core::time::market_day::resolve_since(range, Utc::now(), utc_offset_hours)
        .map_err(internal)?;
    Ok(HistoryQuery {
        trading_type: parse_param(params.trading_type.as_deref())?,
        risk_level: parse_param(params.risk_level.as_deref())?,
        action: parse_param(params.action.as_deref())?,
        symbol: params.symbol.clone(),
        since,
        limit: params.limit,
    })
}

async fn list_analyses(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<CompiledAnalysisRecord>>, ApiError> {
    let Some(repo) = &state.repo else {
        return Err(unavailable());
    };
    let query = history_query(&params, state.utc_offset_hours)?;
    let records = repo.list(&query).await.map_err(internal)?;
    Ok(Json(records))
}

async fn summarize_analyses(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistorySummary>, ApiError> {
    let Some(repo) = &state.repo else {
        return Err(unavailable());
    };
    let query = history_query(&params, state.utc_offset_hours)?;
    let records = repo.list(&query).await.map_err(internal)?;
    Ok(Json(HistorySummary::from_records(&records)))
}

async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompiledAnalysisRecord>, ApiError> {
    let Some(repo) = &state.repo else {
        return Err(unavailable());
    };
    repo.get(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "analysis not found"))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
