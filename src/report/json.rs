use super::headline;
use crate::model::{FailedQuery, ScanEntry, ScanResult, Verdict};
use anyhow::Result;
use serde::Serialize;

/// Field names here are relied on by downstream tooling.
#[derive(Serialize)]
struct JsonReport<'a> {
    status: Verdict,
    message: &'static str,
    scanned_count: usize,
    vulnerable_count: usize,
    failed_count: usize,
    total_vulnerabilities: usize,
    entries: &'a [ScanEntry],
    failed: &'a [FailedQuery],
}

pub fn generate_json_string(result: &ScanResult) -> Result<String> {
    let report = JsonReport {
        status: result.verdict(),
        message: headline(result),
        scanned_count: result.scanned_count,
        vulnerable_count: result.vulnerable_count,
        failed_count: result.failed.len(),
        total_vulnerabilities: result.total_vulnerabilities(),
        entries: &result.entries,
        failed: &result.failed,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, Ecosystem, FailureKind, Severity, VulnerabilityRecord};
    use serde_json::Value;

    #[test]
    fn test_schema_fields() {
        let result = ScanResult {
            entries: vec![ScanEntry {
                dependency: Dependency::new("requests", "2.25.0", Ecosystem::Pip),
                vulnerabilities: vec![VulnerabilityRecord::new("CVE-X", Severity::Critical)
                    .with_summary("Header injection")
                    .with_affected_range("<2.31.0")],
            }],
            failed: vec![FailedQuery {
                dependency: Dependency::new("org.x:y", "1.0", Ecosystem::Maven),
                kind: FailureKind::RateLimited,
                detail: "rate limited by advisory feed".to_string(),
            }],
            scanned_count: 2,
            vulnerable_count: 1,
        };

        let json: Value = serde_json::from_str(&generate_json_string(&result).unwrap()).unwrap();

        assert_eq!(json["status"], "vulnerable");
        assert_eq!(json["scanned_count"], 2);
        assert_eq!(json["vulnerable_count"], 1);
        assert_eq!(json["failed_count"], 1);
        assert_eq!(json["total_vulnerabilities"], 1);

        let entry = &json["entries"][0];
        assert_eq!(entry["dependency"]["name"], "requests");
        assert_eq!(entry["dependency"]["version"], "2.25.0");
        assert_eq!(entry["dependency"]["ecosystem"], "pip");
        assert_eq!(entry["vulnerabilities"][0]["id"], "CVE-X");
        assert_eq!(entry["vulnerabilities"][0]["severity"], "CRITICAL");
        assert_eq!(entry["vulnerabilities"][0]["summary"], "Header injection");
        assert_eq!(entry["vulnerabilities"][0]["affected_range"], "<2.31.0");

        let failed = &json["failed"][0];
        assert_eq!(failed["dependency"]["name"], "org.x:y");
        assert_eq!(failed["kind"], "rate_limited");
    }

    #[test]
    fn test_empty_result_is_explicit() {
        let json: Value =
            serde_json::from_str(&generate_json_string(&ScanResult::default()).unwrap()).unwrap();
        assert_eq!(json["status"], "clean");
        assert_eq!(json["message"], "No vulnerabilities found");
        assert_eq!(json["entries"], Value::Array(vec![]));
        assert_eq!(json["failed"], Value::Array(vec![]));
    }
}
