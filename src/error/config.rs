// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use thiserror::Error;

/// Configuration error code constants
///
/// Error code range: 2001-2006
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// clips_count above the supported maximum
    pub const INVALID_CLIP_COUNT: i32 = 2001;

    /// min/max clip length not positive or not ordered
    pub const INVALID_CLIP_BOUNDS: i32 = 2002;

    /// pre_roll negative or non-finite
    pub const INVALID_PRE_ROLL: i32 = 2003;

    /// spacing_seconds not positive
    pub const INVALID_SPACING: i32 = 2004;

    /// prominence or seed window out of range
    pub const INVALID_PEAK_PARAMETER: i32 = 2005;

    /// quantizer thresholds inconsistent
    pub const INVALID_QUANTIZER: i32 = 2006;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=AnalysisConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Invalid run configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("clips_count must be at most {max} (got {value})")]
    InvalidClipCount { value: usize, max: usize },

    #[error("clip lengths must satisfy 0 < min < max (got min={min}, max={max})")]
    InvalidClipBounds { min: f64, max: f64 },

    #[error("pre_roll must be finite and non-negative (got {value})")]
    InvalidPreRoll { value: f64 },

    #[error("spacing_seconds must be positive (got {value})")]
    InvalidSpacing { value: f64 },

    #[error("{name} out of range (got {value})")]
    InvalidPeakParameter { name: &'static str, value: f64 },

    #[error("quantizer {name} invalid: {reason}")]
    InvalidQuantizer { name: &'static str, reason: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidClipCount { .. } => ConfigErrorCodes::INVALID_CLIP_COUNT,
            ConfigError::InvalidClipBounds { .. } => ConfigErrorCodes::INVALID_CLIP_BOUNDS,
            ConfigError::InvalidPreRoll { .. } => ConfigErrorCodes::INVALID_PRE_ROLL,
            ConfigError::InvalidSpacing { .. } => ConfigErrorCodes::INVALID_SPACING,
            ConfigError::InvalidPeakParameter { .. } => ConfigErrorCodes::INVALID_PEAK_PARAMETER,
            ConfigError::InvalidQuantizer { .. } => ConfigErrorCodes::INVALID_QUANTIZER,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}
