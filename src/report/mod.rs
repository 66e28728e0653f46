mod html;
mod json;
mod text;

pub use html::generate_html_string;
pub use json::generate_json_string;
pub use text::generate_text_string;

use crate::model::{ScanResult, Verdict};
use anyhow::Result;

/// Output format for scan reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary
    Text,
    /// JSON for programmatic use
    Json,
    /// Self-contained HTML document
    Html,
}

impl ReportFormat {
    /// Where the report goes when no output path is given. `None` means
    /// stdout.
    pub fn default_output_path(&self) -> Option<&'static str> {
        match self {
            ReportFormat::Html => Some("vulnerability_report.html"),
            ReportFormat::Text | ReportFormat::Json => None,
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "html" => Ok(ReportFormat::Html),
            _ => Err(format!(
                "Unknown format: {}. Use 'text', 'json', or 'html'",
                s
            )),
        }
    }
}

/// Renders a report. Rendering is pure: the same result always produces
/// the same output.
pub fn render(result: &ScanResult, format: ReportFormat) -> Result<String> {
    match format {
        ReportFormat::Text => Ok(generate_text_string(result)),
        ReportFormat::Json => generate_json_string(result),
        ReportFormat::Html => Ok(generate_html_string(result)),
    }
}

/// One-line outcome shared by every format.
pub(crate) fn headline(result: &ScanResult) -> &'static str {
    match result.verdict() {
        Verdict::Clean => "No vulnerabilities found",
        Verdict::Incomplete => "No vulnerabilities found, but some dependencies could not be checked",
        Verdict::Vulnerable => "Vulnerabilities found",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_from_str() {
        assert_eq!(ReportFormat::from_str("TEXT").unwrap(), ReportFormat::Text);
        assert_eq!(ReportFormat::from_str("json").unwrap(), ReportFormat::Json);
        assert_eq!(ReportFormat::from_str("html").unwrap(), ReportFormat::Html);
        assert!(ReportFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            ReportFormat::Html.default_output_path(),
            Some("vulnerability_report.html")
        );
        assert_eq!(ReportFormat::Json.default_output_path(), None);
    }

    #[test]
    fn test_every_format_is_idempotent_and_severity_ordered() {
        use crate::aggregate::aggregate;
        use crate::model::{
            Dependency, Ecosystem, FailureKind, QueryOutcome, Severity, VulnerabilityRecord,
        };

        let result = aggregate(vec![
            (
                Dependency::new("django", "2.2.0", Ecosystem::Pip),
                QueryOutcome::Success(vec![
                    VulnerabilityRecord::new("ADV-1", Severity::Low),
                    VulnerabilityRecord::new("ADV-2", Severity::Critical),
                    VulnerabilityRecord::new("ADV-3", Severity::High),
                ]),
            ),
            (
                Dependency::new("flask", "0.12", Ecosystem::Pip),
                QueryOutcome::failure(FailureKind::NetworkError, "connection reset"),
            ),
        ]);

        for format in [ReportFormat::Text, ReportFormat::Json, ReportFormat::Html] {
            let first = render(&result, format).unwrap();
            let second = render(&result, format).unwrap();
            assert_eq!(first, second, "{:?} output is not stable", format);

            let critical = first.find("CRITICAL").unwrap();
            let high = first.find("HIGH").unwrap();
            let low = first.find("LOW").unwrap();
            assert!(critical < high, "{:?}: CRITICAL after HIGH", format);
            assert!(high < low, "{:?}: HIGH after LOW", format);
        }
    }

    #[test]
    fn test_every_format_states_empty_result() {
        let result = ScanResult::default();
        for format in [ReportFormat::Text, ReportFormat::Json, ReportFormat::Html] {
            let output = render(&result, format).unwrap();
            assert!(!output.trim().is_empty());
            assert!(
                output.contains("No vulnerabilities found"),
                "{:?} output lacks empty state",
                format
            );
        }
    }
}
