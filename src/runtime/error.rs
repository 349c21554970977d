// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Unifies detection and adapter errors for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::AdapterError;

/// Unified runtime error for detection and adapter failures.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("runtime operation failed: {source}"))]
    Operation { source: AdapterError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// No container runtime found on the system.
    NoRuntimeFound,
    /// The configured runtime override is not a usable endpoint.
    InvalidOverride,
    /// An external tool exited non-zero or could not be started.
    CommandFailed,
    /// The operation is not available for the selected runtime.
    Unsupported,
    /// Any other adapter failure.
    RuntimeOperation,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Detection { source } => match source {
                DetectionError::NoRuntimeFound { .. } => RuntimeErrorKind::NoRuntimeFound,
                DetectionError::InvalidOverride(_) => RuntimeErrorKind::InvalidOverride,
            },
            RuntimeError::Operation { source } => match source {
                AdapterError::CommandFailed { .. } | AdapterError::Spawn { .. } => {
                    RuntimeErrorKind::CommandFailed
                }
                AdapterError::Unsupported { .. } => RuntimeErrorKind::Unsupported,
                _ => RuntimeErrorKind::RuntimeOperation,
            },
        }
    }

    /// Returns the failing tool's stderr if this is a command failure.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            RuntimeError::Operation { source } => source.stderr(),
            _ => None,
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        RuntimeError::Detection { source }
    }
}

impl From<AdapterError> for RuntimeError {
    fn from(source: AdapterError) -> Self {
        RuntimeError::Operation { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::types::RuntimeKind;

    #[test]
    fn kind_classifies_detection_failure() {
        let err: RuntimeError = DetectionError::NoRuntimeFound { attempted: 5 }.into();
        assert_eq!(err.kind(), RuntimeErrorKind::NoRuntimeFound);
        assert!(err.to_string().contains("could not detect container runtime"));
    }

    #[test]
    fn kind_classifies_unsupported() {
        let err: RuntimeError = AdapterError::Unsupported {
            operation: "extract_file_system",
            runtime: RuntimeKind::Crio,
        }
        .into();
        assert_eq!(err.kind(), RuntimeErrorKind::Unsupported);
        assert!(err.stderr().is_none());
    }

    #[test]
    fn stderr_is_exposed_for_command_failures() {
        let err: RuntimeError = AdapterError::CommandFailed {
            operation: "docker save".to_string(),
            code: Some(1),
            stderr: "no such image".to_string(),
        }
        .into();
        assert_eq!(err.kind(), RuntimeErrorKind::CommandFailed);
        assert_eq!(err.stderr(), Some("no such image"));
    }
}
