use crate::config::Settings;
use crate::domain::asset::{TradingType, UploadedAsset};
use crate::domain::record::CompiledAnalysisRecord;
use crate::domain::validation::ChartType;
use crate::llm::error::InferenceError;
use crate::llm::InferenceClient;
use crate::storage::Repository;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod compiler;
pub mod context;
pub mod reader;
pub mod researcher;
pub mod synthesizer;
pub mod validator;

use context::PipelineContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    AwaitingUpload,
    Validating,
    ReadingChart,
    ResearchingContext,
    Synthesizing,
    Compiling,
    Done,
    Rejected,
    Failed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::AwaitingUpload => "awaiting_upload",
            PipelineState::Validating => "validating",
            PipelineState::ReadingChart => "reading_chart",
            PipelineState::ResearchingContext => "researching_context",
            PipelineState::Synthesizing => "synthesizing",
            PipelineState::Compiling => "compiling",
            PipelineState::Done => "done",
            PipelineState::Rejected => "rejected",
            PipelineState::Failed => "failed",
        }
    }

    fn is_phase(self) -> bool {
        matches!(
            self,
            PipelineState::Validating
                | PipelineState::ReadingChart
                | PipelineState::ResearchingContext
                | PipelineState::Synthesizing
                | PipelineState::Compiling
        )
    }

    /// Legal transition table. The research phase exists only on the
    /// equities path.
    pub fn can_transition(self, to: PipelineState, trading_type: TradingType) -> bool {
        use PipelineState::*;
        match (self, to) {
            (AwaitingUpload, Validating) => true,
            (Validating, ReadingChart) | (Validating, Rejected) => true,
            (ReadingChart, ResearchingContext) => trading_type.needs_research(),
            (ReadingChart, Synthesizing) => !trading_type.needs_research(),
            (ResearchingContext, Synthesizing) => true,
            (Synthesizing, Compiling) => true,
            (Compiling, Done) => true,
            (from, Failed) => from.is_phase(),
            (Rejected, AwaitingUpload) | (Failed, AwaitingUpload) | (Done, AwaitingUpload) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum PipelineError {
    InvalidAsset(String),
    Rejected {
        chart_type: ChartType,
        reason: String,
    },
    Failed {
        phase: PipelineState,
        source: InferenceError,
    },
    Persistence(anyhow::Error),
    IllegalTransition {
        from: PipelineState,
        to: PipelineState,
    },
    Incomplete {
        missing: &'static str,
        detail: String,
    },
}

impl PipelineError {
    /// The one string shown to the end user for this outcome.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidAsset(_) => "Please upload a chart image to analyze.".to_string(),
            PipelineError::Rejected { reason, .. } => {
                format!("The uploaded image is not a valid trading chart: {reason}")
            }
            PipelineError::Persistence(_) => {
                "The analysis finished but could not be saved. Please try again.".to_string()
            }
            PipelineError::Failed { .. }
            | PipelineError::IllegalTransition { .. }
            | PipelineError::Incomplete { .. } => {
                "The analysis could not be completed. Please try again.".to_string()
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidAsset(detail) => write!(f, "invalid asset: {detail}"),
            PipelineError::Rejected { chart_type, reason } => {
                write!(f, "image rejected (chart_type={chart_type}): {reason}")
            }
            PipelineError::Failed { phase, source } => write!(f, "{phase} failed: {source}"),
            PipelineError::Persistence(err) => write!(f, "persisting analysis failed: {err:#}"),
            PipelineError::IllegalTransition { from, to } => {
                write!(f, "illegal pipeline transition {from} -> {to}")
            }
            PipelineError::Incomplete { missing, detail } => {
                write!(f, "missing {missing}: {detail}")
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Failed { source, .. } => Some(source),
            PipelineError::Persistence(err) => Some(&**err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub phase_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(120),
        }
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            phase_timeout: settings.phase_timeout(),
        }
    }
}

async fn bounded<T, F>(
    client: &dyn InferenceClient,
    phase: PipelineState,
    limit: Duration,
    fut: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, InferenceError>>,
{
    let started = Instant::now();
    let out = match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(InferenceError::timeout(client.provider(), phase.as_str(), limit)),
    };
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match out {
        Ok(value) => {
            tracing::info!(phase = phase.as_str(), elapsed_ms, "phase complete");
            Ok(value)
        }
        Err(source) => {
            tracing::warn!(
                phase = phase.as_str(),
                elapsed_ms,
                kind = source.kind.as_str(),
                error = %source,
                "phase failed"
            );
            Err(PipelineError::Failed { phase, source })
        }
    }
}

/// Drives one chart image through validation, reading, research (equities
/// only), synthesis and compilation, then stores the compiled record.
///
/// A controller handles one run at a time. After `Done` it must be `reset()`
/// before the next run; `Rejected` and `Failed` return it to
/// `AwaitingUpload` on their own.
pub struct PipelineController {
    client: Arc<dyn InferenceClient>,
    repo: Arc<dyn Repository>,
    options: PipelineOptions,
    state: PipelineState,
    trading_type: Option<TradingType>,
    transitions: Vec<PipelineState>,
}

impl PipelineController {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        repo: Arc<dyn Repository>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            client,
            repo,
            options,
            state: PipelineState::AwaitingUpload,
            trading_type: None,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// States entered during the current (or last) run, in order.
    pub fn transitions(&self) -> &[PipelineState] {
        &self.transitions
    }

    pub fn reset(&mut self) {
        self.state = PipelineState::AwaitingUpload;
        self.trading_type = None;
        self.transitions.clear();
    }

    fn advance(&mut self, to: PipelineState) -> Result<(), PipelineError> {
        let trading_type = self.trading_type.unwrap_or(TradingType::Spot);
        if !self.state.can_transition(to, trading_type) {
            return Err(PipelineError::IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        self.transitions.push(to);
        Ok(())
    }

    pub async fn run(
        &mut self,
        asset_url: &str,
        trading_type: TradingType,
    ) -> Result<CompiledAnalysisRecord, PipelineError> {
        if self.state != PipelineState::AwaitingUpload {
            return Err(PipelineError::IllegalTransition {
                from: self.state,
                to: PipelineState::Validating,
            });
        }
        let asset = UploadedAsset::new(asset_url)
            .map_err(|e| PipelineError::InvalidAsset(e.to_string()))?;

        self.transitions.clear();
        self.trading_type = Some(trading_type);
        let started = Instant::now();

        let result = self.drive(asset.clone(), trading_type).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(record) => {
                tracing::info!(
                    %asset,
                    trading_type = trading_type.as_str(),
                    id = %record.id,
                    symbol = %record.instrument.symbol,
                    action = record.recommendation.action.as_str(),
                    confidence = record.confidence_score,
                    elapsed_ms,
                    "analysis stored"
                );
            }
            Err(err) => {
                let terminal = match err {
                    PipelineError::Rejected { .. } => PipelineState::Rejected,
                    _ => PipelineState::Failed,
                };
                if self.advance(terminal).is_err() {
                    // Only reachable through an illegal transition; record it anyway.
                    self.state = terminal;
                    self.transitions.push(terminal);
                }
                tracing::warn!(
                    %asset,
                    trading_type = trading_type.as_str(),
                    state = terminal.as_str(),
                    elapsed_ms,
                    error = %err,
                    "analysis aborted"
                );
                self.state = PipelineState::AwaitingUpload;
                self.transitions.push(PipelineState::AwaitingUpload);
            }
        }
        result
    }

    async fn drive(
        &mut self,
        asset: UploadedAsset,
        trading_type: TradingType,
    ) -> Result<CompiledAnalysisRecord, PipelineError> {
        let client = Arc::clone(&self.client);
        let limit = self.options.phase_timeout;
        let ctx = PipelineContext::new(asset, trading_type);

        self.advance(PipelineState::Validating)?;
        let validation = bounded(
            client.as_ref(),
            PipelineState::Validating,
            limit,
            validator::validate(client.as_ref(), ctx.asset(), trading_type),
        )
        .await?;
        if !validation.accepts() {
            return Err(PipelineError::Rejected {
                chart_type: validation.chart_type,
                reason: validation.reason,
            });
        }
        let ctx = ctx.with_validation(validation);

        self.advance(PipelineState::ReadingChart)?;
        let reading = bounded(
            client.as_ref(),
            PipelineState::ReadingChart,
            limit,
            reader::read(client.as_ref(), &ctx),
        )
        .await?;

        let findings = if trading_type.needs_research() {
            self.advance(PipelineState::ResearchingContext)?;
            let findings = bounded(
                client.as_ref(),
                PipelineState::ResearchingContext,
                limit,
                researcher::research(client.as_ref(), &reading),
            )
            .await?;
            Some(findings)
        } else {
            None
        };

        let mut ctx = ctx.with_reading(reading);
        if let Some(findings) = findings {
            ctx = ctx.with_findings(findings);
        }

        self.advance(PipelineState::Synthesizing)?;
        let draft = bounded(
            client.as_ref(),
            PipelineState::Synthesizing,
            limit,
            synthesizer::synthesize(client.as_ref(), &ctx),
        )
        .await?;

        self.advance(PipelineState::Compiling)?;
        let record = compiler::compile(&ctx, &draft, Utc::now())?;
        let stored = tokio::time::timeout(limit, compiler::submit(self.repo.as_ref(), &record))
            .await
            .map_err(|_| {
                PipelineError::Persistence(anyhow::anyhow!(
                    "repository create did not finish within {}s",
                    limit.as_secs_f64()
                ))
            })??;

        self.advance(PipelineState::Done)?;
        Ok(stored)
    }
}
