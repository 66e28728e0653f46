use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Advisory severity. Variants are declared in ascending order so the derived
/// `Ord` ranks `Critical` highest and `Unknown` lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }

    /// Parses a textual severity label such as GitHub's `MODERATE`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" | "MODERATE" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub id: String,
    pub severity: Severity,
    pub summary: Option<String>,
    pub affected_range: Option<String>,
}

impl VulnerabilityRecord {
    pub fn new(id: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            severity,
            summary: None,
            affected_range: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_affected_range(mut self, range: impl Into<String>) -> Self {
        self.affected_range = Some(range.into());
        self
    }

    /// Report order: most severe first, then by id.
    pub fn report_order(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Unknown);
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Severity::from_label("moderate"), Severity::Medium);
        assert_eq!(Severity::from_label("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from_label(" high "), Severity::High);
        assert_eq!(Severity::from_label("whatever"), Severity::Unknown);
    }

    #[test]
    fn test_report_order_breaks_ties_by_id() {
        let mut records = vec![
            VulnerabilityRecord::new("PYSEC-2", Severity::High),
            VulnerabilityRecord::new("CVE-9", Severity::Low),
            VulnerabilityRecord::new("GHSA-1", Severity::High),
            VulnerabilityRecord::new("CVE-1", Severity::Critical),
        ];
        records.sort_by(VulnerabilityRecord::report_order);

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-1", "GHSA-1", "PYSEC-2", "CVE-9"]);
    }
}
