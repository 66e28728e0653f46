use super::AdvisorySource;
use crate::error::FeedError;
use crate::model::{Dependency, Ecosystem, Severity, VulnerabilityRecord};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::header::RETRY_AFTER;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.osv.dev";

/// OSV.dev accepts up to 1000 queries per batch request.
const MAX_BATCH_SIZE: usize = 1000;

/// Parallel `/v1/vulns/{id}` lookups within one batch.
const HYDRATE_CONCURRENCY: usize = 4;

/// Advisory source backed by the OSV.dev API.
///
/// Single dependencies go through `/v1/query`, which returns full records.
/// Larger batches use `/v1/querybatch`, which only returns ids, so each
/// distinct id is then fetched from `/v1/vulns/{id}`.
pub struct OsvSource {
    client: reqwest::Client,
    base_url: String,
}

impl OsvSource {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("depscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn query_one(&self, dep: &Dependency) -> Result<Vec<VulnerabilityRecord>, FeedError> {
        let url = format!("{}/v1/query", self.base_url);
        let response: OsvQueryResponse = self
            .send_json(self.client.post(url).json(&OsvQuery::from(dep)))
            .await?;

        if response.next_page_token.is_some() {
            warn!(
                dependency = %dep,
                "OSV returned a paginated result; only the first page of advisories is reported"
            );
        }

        Ok(response
            .vulns
            .unwrap_or_default()
            .iter()
            .map(|vuln| to_record(vuln, dep))
            .collect())
    }

    async fn query_many(
        &self,
        deps: &[Dependency],
    ) -> Result<Vec<Vec<VulnerabilityRecord>>, FeedError> {
        let url = format!("{}/v1/querybatch", self.base_url);
        let batch = OsvBatchQuery {
            queries: deps.iter().map(OsvQuery::from).collect(),
        };
        let response: OsvBatchResponse = self.send_json(self.client.post(url).json(&batch)).await?;

        if response.results.len() != deps.len() {
            return Err(FeedError::Malformed(format!(
                "querybatch returned {} results for {} queries",
                response.results.len(),
                deps.len()
            )));
        }

        for (result, dep) in response.results.iter().zip(deps) {
            if result.next_page_token.is_some() {
                warn!(
                    dependency = %dep,
                    "OSV returned a paginated batch result; only the first page of advisories is reported"
                );
            }
        }

        let ids: Vec<Vec<String>> = response
            .results
            .into_iter()
            .map(|result| {
                result
                    .vulns
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| v.id)
                    .collect()
            })
            .collect();

        let unique: BTreeSet<&str> = ids.iter().flatten().map(String::as_str).collect();
        debug!(
            queries = deps.len(),
            advisories = unique.len(),
            "fetching advisory details"
        );

        let unique: Vec<String> = unique.into_iter().map(str::to_string).collect();
        let details: HashMap<String, OsvVuln> = stream::iter(unique)
            .map(|id| async move { self.fetch_vuln(&id).await })
            .buffer_unordered(HYDRATE_CONCURRENCY)
            .map_ok(|vuln| (vuln.id.clone(), vuln))
            .try_collect()
            .await?;

        ids.iter()
            .zip(deps)
            .map(|(ids, dep)| {
                ids.iter()
                    .map(|id| {
                        details.get(id).map(|vuln| to_record(vuln, dep)).ok_or_else(|| {
                            FeedError::Malformed(format!("missing details for advisory {}", id))
                        })
                    })
                    .collect()
            })
            .collect()
    }

    async fn fetch_vuln(&self, id: &str) -> Result<OsvVuln, FeedError> {
        let url = self.vuln_url(id)?;
        self.send_json(self.client.get(url)).await
    }

    /// `{base}/v1/vulns/{id}` with `id` encoded as a single path segment.
    fn vuln_url(&self, id: &str) -> Result<Url, FeedError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| FeedError::Malformed(format!("invalid feed URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| FeedError::Malformed(format!("feed URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v1", "vulns", id]);
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, FeedError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FeedError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(FeedError::Server {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(FeedError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FeedError::Malformed(e.to_string()))
    }
}

impl Default for OsvSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdvisorySource for OsvSource {
    fn name(&self) -> &'static str {
        "OSV.dev"
    }

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    async fn query_batch(
        &self,
        dependencies: &[Dependency],
    ) -> Result<Vec<Vec<VulnerabilityRecord>>, FeedError> {
        match dependencies {
            [] => Ok(Vec::new()),
            [dep] => Ok(vec![self.query_one(dep).await?]),
            deps => self.query_many(deps).await,
        }
    }
}

#[derive(Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'static str,
}

#[derive(Serialize)]
struct OsvQuery<'a> {
    package: OsvPackage<'a>,
    version: &'a str,
}

impl<'a> From<&'a Dependency> for OsvQuery<'a> {
    fn from(dep: &'a Dependency) -> Self {
        Self {
            package: OsvPackage {
                name: &dep.name,
                ecosystem: dep.ecosystem.osv_name(),
            },
            version: &dep.version,
        }
    }
}

#[derive(Serialize)]
struct OsvBatchQuery<'a> {
    queries: Vec<OsvQuery<'a>>,
}

#[derive(Deserialize)]
struct OsvQueryResponse {
    #[serde(default)]
    vulns: Option<Vec<OsvVuln>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct OsvBatchResponse {
    results: Vec<OsvBatchResult>,
}

#[derive(Deserialize)]
struct OsvBatchResult {
    #[serde(default)]
    vulns: Option<Vec<OsvVulnRef>>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct OsvVulnRef {
    id: String,
}

#[derive(Deserialize)]
struct OsvVuln {
    id: String,
    summary: Option<String>,
    details: Option<String>,
    #[serde(default)]
    severity: Option<Vec<OsvSeverity>>,
    #[serde(default)]
    affected: Option<Vec<OsvAffected>>,
    #[serde(default)]
    database_specific: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OsvSeverity {
    score: Option<String>,
}

#[derive(Deserialize)]
struct OsvAffected {
    package: Option<OsvAffectedPackage>,
    #[serde(default)]
    ranges: Option<Vec<OsvRange>>,
    #[serde(default)]
    database_specific: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct OsvAffectedPackage {
    name: Option<String>,
}

#[derive(Deserialize)]
struct OsvRange {
    #[serde(default)]
    events: Option<Vec<OsvEvent>>,
}

#[derive(Deserialize)]
struct OsvEvent {
    introduced: Option<String>,
    fixed: Option<String>,
    last_affected: Option<String>,
}

fn to_record(vuln: &OsvVuln, dep: &Dependency) -> VulnerabilityRecord {
    let summary = vuln
        .summary
        .as_deref()
        .or_else(|| vuln.details.as_deref().and_then(|d| d.lines().next()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    VulnerabilityRecord {
        id: vuln.id.clone(),
        severity: parse_severity(vuln),
        summary,
        affected_range: affected_range(vuln, dep),
    }
}

fn severity_label(value: &Option<serde_json::Value>) -> Option<Severity> {
    let label = value.as_ref()?.get("severity")?.as_str()?;
    match Severity::from_label(label) {
        Severity::Unknown => None,
        severity => Some(severity),
    }
}

fn parse_severity(vuln: &OsvVuln) -> Severity {
    if let Some(severity) = severity_label(&vuln.database_specific) {
        return severity;
    }

    for score in vuln.severity.iter().flatten().filter_map(|s| s.score.as_deref()) {
        let severity = parse_cvss_score(score);
        if severity != Severity::Unknown {
            return severity;
        }
    }

    vuln.affected
        .iter()
        .flatten()
        .find_map(|a| severity_label(&a.database_specific))
        .unwrap_or(Severity::Unknown)
}

/// Parses a CVSS score into a severity level.
///
/// Accepts numeric base scores and CVSS v3.x vector strings. Other vector
/// versions fall back to a rough reading of their impact metrics.
pub fn parse_cvss_score(score: &str) -> Severity {
    if let Ok(cvss) = score.trim().parse::<f64>() {
        return severity_for_score(cvss);
    }

    if score.starts_with("CVSS:3") {
        if let Some(base) = cvss3_base_score(score) {
            return severity_for_score(base);
        }
    }

    if score.contains("CVSS:") {
        let metrics: Vec<&str> = score.split('/').collect();
        let any = |values: &[&str]| metrics.iter().any(|m| values.contains(m));
        if any(&["C:H", "I:H", "A:H", "VC:H", "VI:H", "VA:H"]) {
            return Severity::High;
        }
        if any(&["C:L", "I:L", "A:L", "VC:L", "VI:L", "VA:L"]) {
            return Severity::Medium;
        }
        return Severity::Low;
    }

    Severity::Unknown
}

fn severity_for_score(score: f64) -> Severity {
    match score {
        s if s >= 9.0 => Severity::Critical,
        s if s >= 7.0 => Severity::High,
        s if s >= 4.0 => Severity::Medium,
        s if s > 0.0 => Severity::Low,
        _ => Severity::Unknown,
    }
}

/// CVSS v3.x base score from a vector string.
fn cvss3_base_score(vector: &str) -> Option<f64> {
    let metrics: HashMap<&str, &str> = vector
        .split('/')
        .skip(1)
        .filter_map(|part| part.split_once(':'))
        .collect();

    let scope_changed = match *metrics.get("S")? {
        "U" => false,
        "C" => true,
        _ => return None,
    };
    let av = match *metrics.get("AV")? {
        "N" => 0.85,
        "A" => 0.62,
        "L" => 0.55,
        "P" => 0.2,
        _ => return None,
    };
    let ac = match *metrics.get("AC")? {
        "L" => 0.77,
        "H" => 0.44,
        _ => return None,
    };
    let pr = match (*metrics.get("PR")?, scope_changed) {
        ("N", _) => 0.85,
        ("L", false) => 0.62,
        ("L", true) => 0.68,
        ("H", false) => 0.27,
        ("H", true) => 0.5,
        _ => return None,
    };
    let ui = match *metrics.get("UI")? {
        "N" => 0.85,
        "R" => 0.62,
        _ => return None,
    };
    let cia = |key: &str| -> Option<f64> {
        match *metrics.get(key)? {
            "H" => Some(0.56),
            "L" => Some(0.22),
            "N" => Some(0.0),
            _ => None,
        }
    };
    let (c, i, a) = (cia("C")?, cia("I")?, cia("A")?);

    let iss = 1.0 - (1.0 - c) * (1.0 - i) * (1.0 - a);
    let impact = if scope_changed {
        7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15)
    } else {
        6.42 * iss
    };
    if impact <= 0.0 {
        return Some(0.0);
    }

    let exploitability = 8.22 * av * ac * pr * ui;
    let raw = if scope_changed {
        (1.08 * (impact + exploitability)).min(10.0)
    } else {
        (impact + exploitability).min(10.0)
    };
    Some(round_up(raw))
}

/// CVSS "round up": smallest one-decimal number not below `value`.
fn round_up(value: f64) -> f64 {
    let scaled = (value * 100_000.0).round() as i64;
    if scaled % 10_000 == 0 {
        scaled as f64 / 100_000.0
    } else {
        ((scaled / 10_000) + 1) as f64 / 10.0
    }
}

/// Human-readable affected range for the entry matching `dep`, such as
/// `>=1.0, <2.0.1`. Multiple ranges are joined with ` || `.
fn affected_range(vuln: &OsvVuln, dep: &Dependency) -> Option<String> {
    let affected = vuln.affected.as_ref()?;
    let entry = affected
        .iter()
        .find(|a| {
            a.package
                .as_ref()
                .and_then(|p| p.name.as_deref())
                .is_some_and(|name| same_package(name, dep))
        })
        .or_else(|| affected.first())?;

    let mut spans = Vec::new();
    for range in entry.ranges.iter().flatten() {
        let mut current: Vec<String> = Vec::new();
        let mut open = false;
        for event in range.events.iter().flatten() {
            if let Some(v) = &event.introduced {
                if open && !current.is_empty() {
                    spans.push(current.join(", "));
                }
                current.clear();
                open = true;
                if v != "0" {
                    current.push(format!(">={}", v));
                }
            }
            if let Some(v) = &event.fixed {
                current.push(format!("<{}", v));
                spans.push(current.join(", "));
                current.clear();
                open = false;
            }
            if let Some(v) = &event.last_affected {
                current.push(format!("<={}", v));
                spans.push(current.join(", "));
                current.clear();
                open = false;
            }
        }
        if open {
            spans.push(if current.is_empty() {
                "*".to_string()
            } else {
                current.join(", ")
            });
        }
    }

    if spans.is_empty() {
        None
    } else {
        Some(spans.join(" || "))
    }
}

fn same_package(name: &str, dep: &Dependency) -> bool {
    match dep.ecosystem {
        Ecosystem::Pip => crate::manifest::normalize_pypi_name(name) == dep.name,
        Ecosystem::Maven => name == dep.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(json: serde_json::Value) -> OsvVuln {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parse_cvss_score_numeric() {
        assert_eq!(parse_cvss_score("9.8"), Severity::Critical);
        assert_eq!(parse_cvss_score("7.0"), Severity::High);
        assert_eq!(parse_cvss_score("5.5"), Severity::Medium);
        assert_eq!(parse_cvss_score("3.9"), Severity::Low);
        assert_eq!(parse_cvss_score("0.0"), Severity::Unknown);
        assert_eq!(parse_cvss_score("not a number"), Severity::Unknown);
    }

    #[test]
    fn test_parse_cvss3_vectors() {
        // 9.8
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"),
            Severity::Critical
        );
        // 7.5
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:N/A:N"),
            Severity::High
        );
        // 6.1, scope changed
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N"),
            Severity::Medium
        );
        // 2.2
        assert_eq!(
            parse_cvss_score("CVSS:3.0/AV:L/AC:H/PR:L/UI:R/S:U/C:L/I:N/A:N"),
            Severity::Low
        );
        assert_eq!(
            parse_cvss_score("CVSS:3.1/AV:L/AC:H/PR:H/UI:R/S:U/C:N/I:N/A:N"),
            Severity::Unknown
        );
    }

    #[test]
    fn test_cvss3_base_scores() {
        assert_eq!(
            cvss3_base_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"),
            Some(9.8)
        );
        assert_eq!(
            cvss3_base_score("CVSS:3.1/AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N"),
            Some(6.1)
        );
        assert_eq!(cvss3_base_score("CVSS:3.1/AV:X/AC:L"), None);
    }

    #[test]
    fn test_parse_cvss4_vector_falls_back() {
        assert_eq!(
            parse_cvss_score("CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:N/VA:N/SC:N/SI:N/SA:N"),
            Severity::High
        );
    }

    #[test]
    fn test_database_specific_label_wins() {
        let v = vuln(serde_json::json!({
            "id": "GHSA-aaaa",
            "severity": [{"type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"}],
            "database_specific": {"severity": "MODERATE"}
        }));
        assert_eq!(parse_severity(&v), Severity::Medium);
    }

    #[test]
    fn test_severity_from_affected_database_specific() {
        let v = vuln(serde_json::json!({
            "id": "PYSEC-1",
            "affected": [{"database_specific": {"severity": "LOW"}}]
        }));
        assert_eq!(parse_severity(&v), Severity::Low);
    }

    #[test]
    fn test_affected_range_formatting() {
        let v = vuln(serde_json::json!({
            "id": "GHSA-j8r2",
            "affected": [
                {"package": {"name": "other", "ecosystem": "PyPI"}, "ranges": [
                    {"type": "ECOSYSTEM", "events": [{"introduced": "0"}, {"fixed": "9.9"}]}
                ]},
                {"package": {"name": "Requests", "ecosystem": "PyPI"}, "ranges": [
                    {"type": "ECOSYSTEM", "events": [
                        {"introduced": "2.0.0"}, {"fixed": "2.31.0"},
                        {"introduced": "3.0.0"}
                    ]}
                ]}
            ]
        }));
        let dep = Dependency::new("requests", "2.25.0", Ecosystem::Pip);
        assert_eq!(
            affected_range(&v, &dep).as_deref(),
            Some(">=2.0.0, <2.31.0 || >=3.0.0")
        );
    }

    #[test]
    fn test_affected_range_open_ended() {
        let v = vuln(serde_json::json!({
            "id": "CVE-1",
            "affected": [{"ranges": [{"events": [{"introduced": "0"}, {"last_affected": "1.4"}]}]}]
        }));
        let dep = Dependency::new("org.x:y", "1.0", Ecosystem::Maven);
        assert_eq!(affected_range(&v, &dep).as_deref(), Some("<=1.4"));

        let v = vuln(serde_json::json!({
            "id": "CVE-2",
            "affected": [{"ranges": [{"events": [{"introduced": "0"}]}]}]
        }));
        assert_eq!(affected_range(&v, &dep).as_deref(), Some("*"));
    }

    #[test]
    fn test_summary_falls_back_to_details() {
        let v = vuln(serde_json::json!({
            "id": "CVE-3",
            "details": "First line.\nMore text."
        }));
        let dep = Dependency::new("flask", "0.12", Ecosystem::Pip);
        let record = to_record(&v, &dep);
        assert_eq!(record.summary.as_deref(), Some("First line."));
        assert_eq!(record.severity, Severity::Unknown);
    }

    #[test]
    fn test_query_serialization() {
        let dep = Dependency::new("org.apache.logging.log4j:log4j-core", "2.14.1", Ecosystem::Maven);
        let json = serde_json::to_value(OsvQuery::from(&dep)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "package": {"name": "org.apache.logging.log4j:log4j-core", "ecosystem": "Maven"},
                "version": "2.14.1"
            })
        );
    }

    #[test]
    fn test_vuln_url_encodes_id() {
        let source = OsvSource::with_base_url("https://feed.example/osv/");
        assert_eq!(
            source.vuln_url("GHSA-1234").unwrap().as_str(),
            "https://feed.example/osv/v1/vulns/GHSA-1234"
        );
        assert_eq!(
            source.vuln_url("GHSA/x y?z").unwrap().as_str(),
            "https://feed.example/osv/v1/vulns/GHSA%2Fx%20y%3Fz"
        );

        let root = OsvSource::with_base_url("http://127.0.0.1:8080");
        assert_eq!(
            root.vuln_url("PYSEC-1").unwrap().as_str(),
            "http://127.0.0.1:8080/v1/vulns/PYSEC-1"
        );
    }

    #[test]
    fn test_osv_source_default() {
        let source = OsvSource::default();
        assert_eq!(source.name(), "OSV.dev");
        assert_eq!(source.max_batch_size(), 1000);
    }
}
