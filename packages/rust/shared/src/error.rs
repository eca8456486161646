//! Error types for AnswerForge.
//!
//! Library crates use [`AnswerForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all AnswerForge operations.
#[derive(Debug, thiserror::Error)]
pub enum AnswerForgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Dataset file does not exist.
    #[error("dataset not found: {path}")]
    DatasetNotFound { path: PathBuf },

    /// Dataset file extension is not one of csv/json/txt.
    #[error("unsupported dataset format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Tabular dataset has no recognized question column.
    #[error("no question column found in {path}")]
    NoQuestionColumn { path: PathBuf },

    /// Malformed dataset contents or serialization failure.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Search collaborator failure (transport, status, or body).
    #[error("search error: {0}")]
    Search(String),

    /// Completion collaborator failure (transport, status, or body).
    #[error("completion error: {0}")]
    Completion(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AnswerForgeError>;

impl AnswerForgeError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
