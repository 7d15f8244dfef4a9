// Error types for the highlight analyzer
//
// This module defines typed errors for input validation, configuration and
// pipeline orchestration. Every error carries a stable numeric code so
// callers (CLI, services wrapping the crate) can react without matching on
// message text.

mod config;
mod input;
mod pipeline;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use input::{log_input_error, InputError, InputErrorCodes};
pub(crate) use input::{validate_seeds, validate_timeline};
pub use pipeline::{log_pipeline_error, PipelineError, PipelineErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the crate boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait_objects() {
        let input: &dyn ErrorCode = &InputError::LengthMismatch {
            times: 3,
            scores: 2,
        };
        assert_eq!(input.code(), 1001);

        let config: &dyn ErrorCode = &ConfigError::InvalidSpacing { value: 0.0 };
        assert_eq!(config.code(), 2004);

        let pipeline: &dyn ErrorCode = &PipelineError::AlreadyAligned { clip_id: 1 };
        assert_eq!(pipeline.code(), 3004);
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), InputError> {
            Err(InputError::InvalidTempo { tempo: 0.0 })
        }

        fn caller() -> Result<(), PipelineError> {
            may_fail()?;
            Ok(())
        }

        match caller() {
            Err(PipelineError::Input(InputError::InvalidTempo { .. })) => {}
            other => panic!("Expected wrapped InvalidTempo, got {:?}", other),
        }
    }
}
