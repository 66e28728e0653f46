//! Configuration file handling.
//!
//! This module provides loading and saving of depscan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/depscan/config.toml`
//! - macOS: `~/Library/Application Support/depscan/config.toml`
//! - Windows: `%APPDATA%\depscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! feed_url = "https://api.osv.dev"
//! concurrency = 4
//! request_timeout_secs = 30
//! default_format = "text"
//!
//! [ignore]
//! packages = ["org.example:*"]
//! vulnerabilities = ["GHSA-xxxx-yyyy-zzzz"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::advisory::{ClientOptions, RetryPolicy, DEFAULT_BASE_URL};

/// Application configuration.
///
/// Every field has a default, so a config file only needs the values it
/// changes. Command-line flags override what is loaded here.
///
/// # Example
///
/// ```no_run
/// use depscan::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Concurrency: {}", config.concurrency);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the OSV-compatible advisory feed.
    pub feed_url: String,

    /// Maximum number of feed requests in flight.
    ///
    /// Default: 4
    pub concurrency: usize,

    /// Dependencies per batch request. Capped by what the feed accepts.
    ///
    /// Default: 100
    pub batch_size: usize,

    /// Timeout for a single request attempt, in seconds.
    pub request_timeout_secs: u64,

    /// Attempts per request when failures are network-level.
    pub network_attempts: u32,

    /// Attempts per request while the feed is rate limiting.
    pub rate_limit_attempts: u32,

    /// Initial backoff after a network failure, in milliseconds.
    pub backoff_base_ms: u64,

    /// Initial backoff after a rate-limit response without a
    /// `Retry-After` hint, in milliseconds.
    pub rate_limit_backoff_ms: u64,

    /// Upper bound for any single backoff, in seconds.
    pub max_backoff_secs: u64,

    /// Abort the whole scan after this many seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_deadline_secs: Option<u64>,

    /// Re-query members of a failed batch individually.
    pub split_failed_batches: bool,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "text", "json", "html"
    /// Default: "text"
    pub default_format: String,

    /// Ignore list configuration for suppressing known issues.
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

/// Configuration for ignoring specific packages or vulnerabilities.
///
/// Use this to suppress known false positives or accepted risks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Package names to exclude from scanning.
    ///
    /// Supports glob patterns (e.g., "org.springframework:*", "django*").
    pub packages: Vec<String>,

    /// Vulnerability IDs to ignore (e.g., "CVE-2021-12345", "GHSA-xxxx").
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    /// Check if a package should be ignored.
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    /// Check if a vulnerability should be ignored.
    pub fn should_ignore_vulnerability(&self, vuln_id: &str) -> bool {
        self.vulnerabilities.iter().any(|id| id == vuln_id)
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.vulnerabilities.is_empty()
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    if !parts[0].is_empty() {
        if !remaining.starts_with(parts[0]) {
            return false;
        }
        remaining = &remaining[parts[0].len()..];
    }

    let last_part = parts[parts.len() - 1];
    if !last_part.is_empty() {
        if !remaining.ends_with(last_part) {
            return false;
        }
        remaining = &remaining[..remaining.len() - last_part.len()];
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        if let Some(pos) = remaining.find(part) {
            remaining = &remaining[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_BASE_URL.to_string(),
            concurrency: 4,
            batch_size: 100,
            request_timeout_secs: 30,
            network_attempts: 3,
            rate_limit_attempts: 5,
            backoff_base_ms: 500,
            rate_limit_backoff_ms: 5_000,
            max_backoff_secs: 60,
            scan_deadline_secs: None,
            split_failed_batches: true,
            default_format: "text".to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the default config file.
    ///
    /// Returns the defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration to the default config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use depscan::Config;
    ///
    /// let path = Config::config_path();
    /// println!("Config file: {}", path.display());
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            network_attempts: self.network_attempts.max(1),
            rate_limit_attempts: self.rate_limit_attempts.max(1),
            base_delay: Duration::from_millis(self.backoff_base_ms),
            rate_limit_delay: Duration::from_millis(self.rate_limit_backoff_ms),
            max_delay: Duration::from_secs(self.max_backoff_secs),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            concurrency: self.concurrency.max(1),
            batch_size: self.batch_size.max(1),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            retry: self.retry_policy(),
            split_failed_batches: self.split_failed_batches,
        }
    }

    pub fn scan_deadline(&self) -> Option<Duration> {
        self.scan_deadline_secs.map(Duration::from_secs)
    }
}
