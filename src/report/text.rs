use super::headline;
use crate::model::ScanResult;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

const RULE_WIDTH: usize = 62;

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Affected")]
    affected: String,
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Ecosystem")]
    ecosystem: String,
    #[tabled(rename = "Reason")]
    reason: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

pub fn generate_text_string(result: &ScanResult) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "VULNERABILITY SCAN SUMMARY");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);
    let _ = writeln!(out, "Total packages scanned: {}", result.scanned_count);
    let _ = writeln!(out, "Vulnerable packages: {}", result.vulnerable_count);
    let _ = writeln!(out, "Total vulnerabilities: {}", result.total_vulnerabilities());
    let _ = writeln!(out, "Failed queries: {}", result.failed.len());
    let _ = writeln!(out);

    if result.entries.is_empty() {
        let _ = writeln!(out, "{}.", headline(result));
    } else {
        let rows: Vec<VulnRow> = result
            .entries
            .iter()
            .flat_map(|entry| {
                entry.vulnerabilities.iter().map(move |v| VulnRow {
                    package: entry.dependency.name.clone(),
                    version: entry.dependency.version.clone(),
                    severity: v.severity.to_string(),
                    id: v.id.clone(),
                    summary: v
                        .summary
                        .as_deref()
                        .map(|s| truncate(s, 50))
                        .unwrap_or_else(|| "-".to_string()),
                    affected: v
                        .affected_range
                        .as_deref()
                        .map(|s| truncate(s, 30))
                        .unwrap_or_else(|| "-".to_string()),
                })
            })
            .collect();

        let _ = writeln!(out, "VULNERABILITIES FOUND:");
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", Table::new(rows).with(Style::rounded()));

        let counts = result.severity_counts();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Severity: {} critical, {} high, {} medium, {} low, {} unknown",
            counts.critical, counts.high, counts.medium, counts.low, counts.unknown
        );
    }

    if result.has_failures() {
        let rows: Vec<FailureRow> = result
            .failed
            .iter()
            .map(|f| FailureRow {
                package: f.dependency.name.clone(),
                version: f.dependency.version.clone(),
                ecosystem: f.dependency.ecosystem.to_string(),
                reason: f.kind.to_string(),
                detail: truncate(&f.detail, 60),
            })
            .collect();

        let _ = writeln!(out);
        let _ = writeln!(out, "QUERIES FAILED ({}):", result.failed.len());
        let _ = writeln!(
            out,
            "These dependencies could not be checked and are not known to be clean."
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", Table::new(rows).with(Style::rounded()));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", rule);
    out
}

/// Shortens to `max_chars` characters, ending with `...` when cut.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
