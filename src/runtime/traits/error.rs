// ABOUTME: Error type shared by all runtime adapter operations.
// ABOUTME: Carries the failing tool's stderr so callers can diagnose missing images or tools.

use crate::runtime::endpoint::ParseError;
use crate::runtime::types::RuntimeKind;

/// Errors from adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("{operation} failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        operation: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{operation} is not implemented for {runtime}")]
    Unsupported {
        operation: &'static str,
        runtime: RuntimeKind,
    },

    #[error("unexpected output from {operation}: {output}")]
    UnexpectedOutput { operation: String, output: String },

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdapterError {
    /// Stderr of the failed tool, if the error came from one.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            AdapterError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}
