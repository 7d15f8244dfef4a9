// Input validation errors for collaborator data (novelty curve, seeds, beats)

use crate::error::ErrorCode;
use log::error;
use thiserror::Error;

/// Input error code constants
///
/// Error code range: 1001-1008
pub struct InputErrorCodes {}

impl InputErrorCodes {
    /// `times` and `scores` have different lengths
    pub const LENGTH_MISMATCH: i32 = 1001;

    /// A value is NaN or infinite
    pub const NON_FINITE_VALUE: i32 = 1002;

    /// A timestamp is negative
    pub const NEGATIVE_TIME: i32 = 1003;

    /// Timestamps are not strictly increasing
    pub const NON_MONOTONIC_TIMES: i32 = 1004;

    /// A novelty score lies outside [0, 1]
    pub const SCORE_OUT_OF_RANGE: i32 = 1005;

    /// Tempo is not a positive finite BPM
    pub const INVALID_TEMPO: i32 = 1006;

    /// Audio duration is negative or non-finite
    pub const INVALID_DURATION: i32 = 1007;

    /// Seed timestamp is negative or non-finite
    pub const INVALID_SEED: i32 = 1008;
}

/// Log an input error with structured context
pub fn log_input_error(err: &InputError, context: &str) {
    error!(
        "Input error in {}: code={}, component=InputValidation, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Malformed collaborator input
///
/// These are caller contract violations. The analyzer reports them
/// immediately and never repairs the offending data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("times and scores differ in length ({times} vs {scores})")]
    LengthMismatch { times: usize, scores: usize },

    #[error("{field}[{index}] is not finite ({value})")]
    NonFiniteValue {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{field}[{index}] is negative ({value})")]
    NegativeTime {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{field}[{index}] does not increase ({previous} -> {value})")]
    NonMonotonicTimes {
        field: &'static str,
        index: usize,
        previous: f64,
        value: f64,
    },

    #[error("scores[{index}] outside [0, 1] ({value})")]
    ScoreOutOfRange { index: usize, value: f64 },

    #[error("tempo must be a positive BPM (got {tempo})")]
    InvalidTempo { tempo: f64 },

    #[error("audio duration must be finite and non-negative (got {value})")]
    InvalidDuration { value: f64 },

    #[error("seed_timestamps[{index}] must be finite and non-negative (got {value})")]
    InvalidSeed { index: usize, value: f64 },
}

impl ErrorCode for InputError {
    fn code(&self) -> i32 {
        match self {
            InputError::LengthMismatch { .. } => InputErrorCodes::LENGTH_MISMATCH,
            InputError::NonFiniteValue { .. } => InputErrorCodes::NON_FINITE_VALUE,
            InputError::NegativeTime { .. } => InputErrorCodes::NEGATIVE_TIME,
            InputError::NonMonotonicTimes { .. } => InputErrorCodes::NON_MONOTONIC_TIMES,
            InputError::ScoreOutOfRange { .. } => InputErrorCodes::SCORE_OUT_OF_RANGE,
            InputError::InvalidTempo { .. } => InputErrorCodes::INVALID_TEMPO,
            InputError::InvalidDuration { .. } => InputErrorCodes::INVALID_DURATION,
            InputError::InvalidSeed { .. } => InputErrorCodes::INVALID_SEED,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

/// Check a timestamp series: finite, non-negative, strictly increasing.
pub(crate) fn validate_timeline(field: &'static str, times: &[f64]) -> Result<(), InputError> {
    for (index, &value) in times.iter().enumerate() {
        if !value.is_finite() {
            return Err(InputError::NonFiniteValue {
                field,
                index,
                value,
            });
        }
        if value < 0.0 {
            return Err(InputError::NegativeTime {
                field,
                index,
                value,
            });
        }
        if index > 0 && value <= times[index - 1] {
            return Err(InputError::NonMonotonicTimes {
                field,
                index,
                previous: times[index - 1],
                value,
            });
        }
    }
    Ok(())
}

/// Check seed timestamps: finite and non-negative, any order.
pub(crate) fn validate_seeds(seeds: &[f64]) -> Result<(), InputError> {
    match seeds
        .iter()
        .enumerate()
        .find(|(_, seed)| !seed.is_finite() || **seed < 0.0)
    {
        Some((index, &value)) => Err(InputError::InvalidSeed { index, value }),
        None => Ok(()),
    }
}
