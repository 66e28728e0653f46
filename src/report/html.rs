//! HTML report output format.
//!
//! Generates a self-contained HTML report with styling for easy viewing and
//! sharing. Every value taken from a manifest or the advisory feed is
//! escaped before it is written into the document.

use super::headline;
use crate::model::{ScanResult, Severity, Verdict};
use std::fmt::Write;

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>depscan Report</title>
    <style>
        :root {
            --bg-color: #1a1a2e;
            --card-bg: #16213e;
            --text-color: #eee;
            --text-muted: #888;
            --border-color: #0f3460;
            --critical: #dc3545;
            --high: #fd7e14;
            --medium: #ffc107;
            --low: #28a745;
            --accent: #0f3460;
        }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-color);
            color: var(--text-color);
            line-height: 1.6;
            padding: 2rem;
        }
        .container { max-width: 1200px; margin: 0 auto; }
        header {
            margin-bottom: 2rem;
            padding-bottom: 1rem;
            border-bottom: 1px solid var(--border-color);
        }
        h1 { font-size: 1.75rem; font-weight: 600; }
        .headline { color: var(--text-muted); }
        .headline.vulnerable { color: var(--critical); }
        .headline.incomplete { color: var(--medium); }
        .stats {
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
            gap: 1rem;
            margin-bottom: 2rem;
        }
        .stat-card {
            background: var(--card-bg);
            padding: 1.25rem;
            border-radius: 8px;
            border: 1px solid var(--border-color);
        }
        .stat-value { font-size: 2rem; font-weight: 700; }
        .stat-label { color: var(--text-muted); font-size: 0.85rem; }
        section { margin-bottom: 2rem; }
        h2 {
            font-size: 1.25rem;
            margin-bottom: 1rem;
            padding-bottom: 0.5rem;
            border-bottom: 1px solid var(--border-color);
        }
        table {
            width: 100%;
            border-collapse: collapse;
            background: var(--card-bg);
            border-radius: 8px;
            overflow: hidden;
        }
        th, td {
            padding: 0.75rem 1rem;
            text-align: left;
            border-bottom: 1px solid var(--border-color);
        }
        th { background: var(--accent); font-weight: 600; }
        .severity { padding: 0.25rem 0.5rem; border-radius: 4px; font-size: 0.75rem; font-weight: 600; }
        .severity-critical { background: var(--critical); color: white; }
        .severity-high { background: var(--high); color: white; }
        .severity-medium { background: var(--medium); color: black; }
        .severity-low { background: var(--low); color: white; }
        .warning { color: var(--medium); margin-bottom: 1rem; }
        .empty { text-align: center; padding: 2rem; color: var(--text-muted); }
        footer { text-align: center; color: var(--text-muted); font-size: 0.8rem; margin-top: 2rem; padding-top: 1rem; border-top: 1px solid var(--border-color); }
    </style>
</head>
<body>
    <div class="container">
"#;

const FOOT: &str = r#"        <footer>
            Generated by depscan
        </footer>
    </div>
</body>
</html>
"#;

/// Generate the HTML report as a string
pub fn generate_html_string(result: &ScanResult) -> String {
    let mut html = String::from(HEAD);

    let headline_class = match result.verdict() {
        Verdict::Clean => "headline",
        Verdict::Vulnerable => "headline vulnerable",
        Verdict::Incomplete => "headline incomplete",
    };
    let _ = write!(
        html,
        r#"        <header>
            <h1>Vulnerability Scan Report</h1>
            <p class="{}">{}</p>
        </header>
        <div class="stats">
            <div class="stat-card">
                <div class="stat-value">{}</div>
                <div class="stat-label">Packages Scanned</div>
            </div>
            <div class="stat-card">
                <div class="stat-value">{}</div>
                <div class="stat-label">Vulnerable Packages</div>
            </div>
            <div class="stat-card">
                <div class="stat-value">{}</div>
                <div class="stat-label">Vulnerabilities</div>
            </div>
            <div class="stat-card">
                <div class="stat-value">{}</div>
                <div class="stat-label">Failed Queries</div>
            </div>
        </div>
"#,
        headline_class,
        headline(result),
        result.scanned_count,
        result.vulnerable_count,
        result.total_vulnerabilities(),
        result.failed.len()
    );

    html.push_str(
        r#"        <section>
            <h2>Vulnerabilities</h2>
"#,
    );

    if result.entries.is_empty() {
        html.push_str(
            r#"            <div class="empty">No vulnerabilities found</div>
"#,
        );
    } else {
        html.push_str(
            r#"            <table>
                <thead>
                    <tr>
                        <th>Severity</th>
                        <th>Package</th>
                        <th>Version</th>
                        <th>ID</th>
                        <th>Summary</th>
                        <th>Affected</th>
                    </tr>
                </thead>
                <tbody>
"#,
        );

        for entry in &result.entries {
            for vuln in &entry.vulnerabilities {
                let _ = write!(
                    html,
                    r#"                    <tr>
                        <td><span class="severity {}">{}</span></td>
                        <td>{}</td>
                        <td>{}</td>
                        <td>{}</td>
                        <td>{}</td>
                        <td>{}</td>
                    </tr>
"#,
                    severity_class(vuln.severity),
                    vuln.severity.as_str(),
                    html_escape(&entry.dependency.name),
                    html_escape(&entry.dependency.version),
                    html_escape(&vuln.id),
                    vuln.summary
                        .as_deref()
                        .map(html_escape)
                        .unwrap_or_else(|| "-".to_string()),
                    vuln.affected_range
                        .as_deref()
                        .map(html_escape)
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }

        html.push_str(
            r#"                </tbody>
            </table>
"#,
        );
    }

    html.push_str("        </section>\n");

    html.push_str(
        r#"        <section>
            <h2>Failed Queries</h2>
"#,
    );

    if result.failed.is_empty() {
        html.push_str(
            r#"            <div class="empty">All dependencies were checked</div>
"#,
        );
    } else {
        html.push_str(
            r#"            <p class="warning">These dependencies could not be checked and are not known to be clean.</p>
            <table>
                <thead>
                    <tr>
                        <th>Package</th>
                        <th>Version</th>
                        <th>Ecosystem</th>
                        <th>Reason</th>
                        <th>Detail</th>
                    </tr>
                </thead>
                <tbody>
"#,
        );

        for failed in &result.failed {
            let _ = write!(
                html,
                r#"                    <tr>
                        <td>{}</td>
                        <td>{}</td>
                        <td>{}</td>
                        <td>{}</td>
                        <td>{}</td>
                    </tr>
"#,
                html_escape(&failed.dependency.name),
                html_escape(&failed.dependency.version),
                failed.dependency.ecosystem,
                failed.kind,
                html_escape(&failed.detail),
            );
        }

        html.push_str(
            r#"                </tbody>
            </table>
"#,
        );
    }

    html.push_str("        </section>\n");
    html.push_str(FOOT);
    html
}

fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "severity-critical",
        Severity::High => "severity-high",
        Severity::Medium => "severity-medium",
        Severity::Low => "severity-low",
        Severity::Unknown => "",
    }
}

fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
