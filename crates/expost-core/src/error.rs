//! Unified error types for the expost crates
//!
//! This module provides a common error type [`ExpostError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `ExpostError` for uniform error handling at API boundaries.
//!
//! The two analysis-specific variants deserve a note:
//!
//! - [`ExpostError::Structure`] is raised when a fundamentally required input
//!   (the power table, an aligned time index) is missing or malformed. No
//!   meaningful downstream output is possible, so the run aborts.
//! - [`ExpostError::SingularWindow`] is raised when the flow-tracing matrix of
//!   one aggregation window is not invertible. It is fatal for that window
//!   only; other windows are unaffected.

use thiserror::Error;

/// Unified error type for all expost operations.
#[derive(Error, Debug)]
pub enum ExpostError {
    /// I/O errors (file access etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fundamentally required series or table is absent or misaligned.
    /// Aborts the run.
    #[error("Structural input mismatch: {0}")]
    Structure(String),

    /// The tracing matrix of one aggregation window is singular. Fatal for
    /// that window only, reported distinctly from a numeric result.
    #[error("singular flow-tracing matrix for window starting at step {start} ({len} steps)")]
    SingularWindow { start: usize, len: usize },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using ExpostError.
pub type ExpostResult<T> = Result<T, ExpostError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for ExpostError {
    fn from(err: anyhow::Error) -> Self {
        ExpostError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for ExpostError {
    fn from(s: String) -> Self {
        ExpostError::Other(s)
    }
}

impl From<&str> for ExpostError {
    fn from(s: &str) -> Self {
        ExpostError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ExpostError::Structure("power table is empty".into());
        assert!(err.to_string().contains("Structural input mismatch"));
        assert!(err.to_string().contains("power table is empty"));
    }

    #[test]
    fn test_singular_window_display() {
        let err = ExpostError::SingularWindow { start: 24, len: 24 };
        assert!(err.to_string().contains("step 24"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ExpostError = io_err.into();
        assert!(matches!(err, ExpostError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ExpostResult<()> {
            Err(ExpostError::Validation("test".into()))
        }

        fn outer() -> ExpostResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
