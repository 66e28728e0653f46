//! The scan pipeline: dedupe, query, join, aggregate.

use crate::advisory::{AdvisoryClient, OsvSource};
use crate::aggregate::aggregate;
use crate::config::{Config, IgnoreConfig};
use crate::error::ScanError;
use crate::model::{Dependency, FailureKind, QueryOutcome, ScanResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct ScanPipeline {
    client: AdvisoryClient,
    ignore: IgnoreConfig,
    deadline: Option<Duration>,
}

impl ScanPipeline {
    pub fn new(client: AdvisoryClient) -> Self {
        Self {
            client,
            ignore: IgnoreConfig::default(),
            deadline: None,
        }
    }

    /// Pipeline against the configured OSV feed.
    pub fn from_config(config: &Config) -> Self {
        let source = Arc::new(OsvSource::with_base_url(&config.feed_url));
        Self::new(AdvisoryClient::new(source, config.client_options()))
            .with_ignore(config.ignore.clone())
            .with_deadline(config.scan_deadline())
    }

    pub fn with_ignore(mut self, ignore: IgnoreConfig) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Scans `dependencies` and aggregates the outcome.
    ///
    /// Duplicate and ignored dependencies are removed before querying.
    /// Aggregation starts only after every query has resolved.
    ///
    /// # Errors
    ///
    /// [`ScanError::Cancelled`] if `cancel` fires, [`ScanError::DeadlineExceeded`]
    /// if the configured deadline elapses, and [`ScanError::FeedUnreachable`]
    /// if every query failed at the network level.
    pub async fn run(
        &self,
        dependencies: &[Dependency],
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScanError> {
        let unique = self.prepare(dependencies);

        let outcomes = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.client.query_all(&unique, cancel))
                .await
                .map_err(|_| ScanError::DeadlineExceeded(deadline))??,
            None => self.client.query_all(&unique, cancel).await?,
        };

        let unreachable = !outcomes.is_empty()
            && outcomes
                .iter()
                .all(|o| o.failure_kind() == Some(FailureKind::NetworkError));
        if unreachable {
            return Err(ScanError::FeedUnreachable {
                attempted: unique.len(),
            });
        }

        let outcomes = outcomes.into_iter().map(|o| self.drop_ignored_records(o));
        let result = aggregate(unique.into_iter().zip(outcomes));

        info!(
            source = self.client.source_name(),
            scanned = result.scanned_count,
            vulnerable = result.vulnerable_count,
            failed = result.failed.len(),
            "scan complete"
        );

        Ok(result)
    }

    fn prepare(&self, dependencies: &[Dependency]) -> Vec<Dependency> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(dependencies.len());

        for dep in dependencies {
            if self.ignore.should_ignore_package(&dep.name) {
                debug!(dependency = %dep, "ignoring package");
                continue;
            }
            if seen.insert(dep) {
                unique.push(dep.clone());
            }
        }

        if unique.len() < dependencies.len() {
            debug!(
                input = dependencies.len(),
                unique = unique.len(),
                "removed duplicate or ignored dependencies"
            );
        }
        unique
    }

    fn drop_ignored_records(&self, outcome: QueryOutcome) -> QueryOutcome {
        match outcome {
            QueryOutcome::Success(mut records) if !self.ignore.is_empty() => {
                records.retain(|r| !self.ignore.should_ignore_vulnerability(&r.id));
                QueryOutcome::Success(records)
            }
            other => other,
        }
    }
}
