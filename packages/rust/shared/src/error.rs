//! Error types for cfpscout.
//!
//! Library crates use [`CfpScoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Expected per-URL failures (unreachable page, empty page, no usable CFP
//! data) are not errors: they travel as [`crate::FailureReason`] values.

use std::path::PathBuf;

/// Top-level error type for all cfpscout operations.
#[derive(Debug, thiserror::Error)]
pub enum CfpScoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside the normal fetch outcome model.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or structured-data parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// URL store / database error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Headless browser session error.
    #[error("rendering error: {0}")]
    Rendering(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad URL, unknown enum value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Record sink (indexing collaborator) error.
    #[error("sink error: {0}")]
    Sink(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CfpScoutError>;

impl CfpScoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short variant name, used to classify unexpected per-URL failures
    /// as `exception:<kind>`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Network(_) => "network",
            Self::Parse { .. } => "parse",
            Self::Storage(_) => "storage",
            Self::Rendering(_) => "rendering",
            Self::Io { .. } => "io",
            Self::Validation { .. } => "validation",
            Self::Sink(_) => "sink",
        }
    }
}
