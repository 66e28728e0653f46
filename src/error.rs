//! Error types.
//!
//! Per-dependency query failures never surface as [`ScanError`]; they are
//! captured as [`QueryOutcome::Failure`](crate::model::QueryOutcome) and
//! reported alongside the findings.

use crate::model::FailureKind;
use std::time::Duration;
use thiserror::Error;

/// A manifest could not be read or understood.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unknown manifest type: {0} (expected requirements.txt or pom.xml)")]
    UnknownManifest(String),

    #[error("line {line}: invalid requirement `{content}`")]
    InvalidLine { line: usize, content: String },

    #[error("invalid XML: {0}")]
    Xml(String),

    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),
}

/// A single request to the advisory feed failed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited by advisory feed")]
    RateLimited { retry_after: Option<Duration> },

    #[error("advisory feed returned server error {status}")]
    Server { status: u16 },

    #[error("advisory feed rejected request with status {status}")]
    Rejected { status: u16 },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FeedError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            FeedError::Network(_) | FeedError::Timeout(_) | FeedError::Server { .. } => {
                FailureKind::NetworkError
            }
            FeedError::RateLimited { .. } => FailureKind::RateLimited,
            FeedError::Rejected { .. } | FeedError::Malformed(_) => FailureKind::MalformedResponse,
        }
    }

    /// Transient failures worth another attempt. Rate limiting has its own
    /// budget and is not included here.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind() == FailureKind::NetworkError
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::Malformed(err.to_string())
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

/// The scan as a whole could not complete. No report is produced.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan cancelled")]
    Cancelled,

    #[error("scan deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("advisory feed unreachable: all {attempted} queries failed with network errors")]
    FeedUnreachable { attempted: usize },
}
