// promptmap/src/error.rs
//! Error types for the aggregation core, configuration and the command line.

use std::path::PathBuf;

/// Failures surfaced to the caller of an aggregation run.
///
/// Producer-local failures never show up here; they are reported to the
/// run's `DiagnosticSink` and swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("record path is empty")]
    EmptyPath,

    #[error("path segment {index} is empty")]
    EmptySegment { index: usize },

    #[error("child name is empty")]
    EmptyName,

    #[error("operation cancelled")]
    Cancelled,
}

impl AggregateError {
    /// True for programming errors at the producer boundary (bad records).
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            AggregateError::EmptyPath | AggregateError::EmptySegment { .. } | AggregateError::EmptyName
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Config parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems with what the command line points at, as opposed to failures
/// while processing it.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("input not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("{0}")]
    Config(#[from] ConfigError),
}
