use super::{Dependency, FailureKind, Severity, VulnerabilityRecord};
use serde::{Deserialize, Serialize};

/// A dependency with at least one known vulnerability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub dependency: Dependency,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
}

/// A dependency whose advisory query could not be completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedQuery {
    pub dependency: Dependency,
    pub kind: FailureKind,
    pub detail: String,
}

/// Final decision derived from a [`ScanResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Every query succeeded and nothing was found.
    Clean,
    /// At least one dependency has a known vulnerability.
    Vulnerable,
    /// Nothing was found, but some queries failed.
    Incomplete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub unknown: usize,
}

/// Aggregated result of one scan.
///
/// `entries` and `failed` follow the order of the scanned dependency list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub entries: Vec<ScanEntry>,
    pub failed: Vec<FailedQuery>,
    pub scanned_count: usize,
    pub vulnerable_count: usize,
}

impl ScanResult {
    /// True if any dependency has a known vulnerability. Failed queries do
    /// not affect this.
    pub fn is_vulnerable(&self) -> bool {
        self.vulnerable_count > 0
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn verdict(&self) -> Verdict {
        if self.is_vulnerable() {
            Verdict::Vulnerable
        } else if self.has_failures() {
            Verdict::Incomplete
        } else {
            Verdict::Clean
        }
    }

    pub fn total_vulnerabilities(&self) -> usize {
        self.entries.iter().map(|e| e.vulnerabilities.len()).sum()
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for record in self.entries.iter().flat_map(|e| &e.vulnerabilities) {
            match record.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}
