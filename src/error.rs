use thiserror::Error;

use crate::core::{Dimension, Granularity};

/// Broad class of a failure, used to pick retry and reporting behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Addressing,
    Fetch,
    Parse,
    Internal,
}

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("Invalid {granularity} date \"{input}\" (expected {expected})")]
    InvalidDate {
        input: String,
        granularity: Granularity,
        expected: &'static str,
    },

    #[error("Unknown dimension: {input}")]
    UnknownDimension { input: String },

    #[error("Unknown {dimension} option: {option}")]
    UnknownOption { dimension: Dimension, option: String },

    #[error("Invalid hour \"{input}\" (expected 0-23)")]
    InvalidHour { input: String },

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed shard {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to start fetch workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to spawn refresh task: {0}")]
    Spawn(std::io::Error),

    #[error("Failed to read session input: {0}")]
    Stdin(std::io::Error),

    #[error("Failed to load config {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("{failed} of {total} date keys failed")]
    Incomplete { failed: usize, total: usize },
}

impl AppError {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidDate { .. }
            | AppError::UnknownDimension { .. }
            | AppError::UnknownOption { .. }
            | AppError::InvalidHour { .. } => ErrorKind::Addressing,
            AppError::Fetch(_) => ErrorKind::Fetch,
            AppError::Parse { .. } => ErrorKind::Parse,
            AppError::Pool(_)
            | AppError::Spawn(_)
            | AppError::Stdin(_)
            | AppError::Config { .. }
            | AppError::Incomplete { .. } => ErrorKind::Internal,
        }
    }

    /// Fetch and parse failures may succeed on a second attempt; addressing never does
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Fetch | ErrorKind::Parse)
    }
}

/// Failure retrieving a single shard. Any of these aborts the whole batch.
#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("Shard not found: {path}")]
    NotFound { path: String },

    #[error("Shard {path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("Failed to fetch {path}: {reason}")]
    Transport { path: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
