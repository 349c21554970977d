// ABOUTME: Application-wide error types for keel.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::runtime::{AdapterError, DetectionError, RuntimeError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<DetectionError> for Error {
    fn from(e: DetectionError) -> Self {
        Error::Runtime(e.into())
    }
}

impl From<AdapterError> for Error {
    fn from(e: AdapterError) -> Self {
        Error::Runtime(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
