use crate::domain::asset::{TradingType, UploadedAsset};
use crate::domain::reading::ChartReading;
use crate::domain::research::ContextFindings;
use crate::domain::validation::{ChartType, ValidationResult};

/// Read-only view of everything a run has produced so far.
///
/// Each phase receives it by reference; completing a phase yields a new
/// context via the consuming `with_*` methods, so an output can never be
/// changed once a later phase has seen it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineContext {
    asset: UploadedAsset,
    trading_type: TradingType,
    validation: Option<ValidationResult>,
    reading: Option<ChartReading>,
    findings: Option<ContextFindings>,
}

impl PipelineContext {
    pub fn new(asset: UploadedAsset, trading_type: TradingType) -> Self {
        Self {
            asset,
            trading_type,
            validation: None,
            reading: None,
            findings: None,
        }
    }

    pub fn with_validation(self, validation: ValidationResult) -> Self {
        Self {
            validation: Some(validation),
            ..self
        }
    }

    pub fn with_reading(self, reading: ChartReading) -> Self {
        Self {
            reading: Some(reading),
            ..self
        }
    }

    pub fn with_findings(self, findings: ContextFindings) -> Self {
        Self {
            findings: Some(findings),
            ..self
        }
    }

    pub fn asset(&self) -> &UploadedAsset {
        &self.asset
    }

    pub fn trading_type(&self) -> TradingType {
        self.trading_type
    }

    pub fn chart_type(&self) -> ChartType {
        self.validation
            .as_ref()
            .map(|v| v.chart_type)
            .unwrap_or(ChartType::None)
    }

    pub fn reading(&self) -> Option<&ChartReading> {
        self.reading.as_ref()
    }

    pub fn findings(&self) -> Option<&ContextFindings> {
        self.findings.as_ref()
    }
}
