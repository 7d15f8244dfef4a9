// Pipeline orchestration errors

use crate::error::{ConfigError, ErrorCode, InputError};
use crate::telemetry::PipelineStage;
use log::error;
use thiserror::Error;

/// Pipeline error code constants
///
/// Error code range: 3001-3004
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Wrapped input validation failure
    pub const INVALID_INPUT: i32 = 3001;

    /// Wrapped configuration failure
    pub const INVALID_CONFIG: i32 = 3002;

    /// Run was cancelled between stages
    pub const CANCELLED: i32 = 3003;

    /// Segment alignment was already applied
    pub const ALREADY_ALIGNED: i32 = 3004;
}

/// Log a pipeline error with structured context
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    error!(
        "Pipeline error in {}: code={}, component=Analyzer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced by the analysis orchestrator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("analysis cancelled before {stage}")]
    Cancelled { stage: PipelineStage },

    #[error("clip {clip_id} has already been aligned to the beat grid")]
    AlreadyAligned { clip_id: u32 },
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::Input(_) => PipelineErrorCodes::INVALID_INPUT,
            PipelineError::Config(_) => PipelineErrorCodes::INVALID_CONFIG,
            PipelineError::Cancelled { .. } => PipelineErrorCodes::CANCELLED,
            PipelineError::AlreadyAligned { .. } => PipelineErrorCodes::ALREADY_ALIGNED,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

impl PipelineError {
    /// Code of the innermost error (input/config codes pass through).
    pub fn root_code(&self) -> i32 {
        match self {
            PipelineError::Input(inner) => inner.code(),
            PipelineError::Config(inner) => inner.code(),
            other => other.code(),
        }
    }
}
