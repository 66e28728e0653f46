use super::VulnerabilityRecord;
use serde::{Deserialize, Serialize};

/// Why a query for a dependency could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NetworkError,
    RateLimited,
    MalformedResponse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NetworkError => "network_error",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of querying the advisory feed for a single dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Success(Vec<VulnerabilityRecord>),
    Failure { kind: FailureKind, detail: String },
}

impl QueryOutcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        QueryOutcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::Failure { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            QueryOutcome::Failure { kind, .. } => Some(*kind),
            QueryOutcome::Success(_) => None,
        }
    }
}
