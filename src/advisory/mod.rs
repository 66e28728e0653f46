//! Advisory feed access.
//!
//! [`AdvisorySource`] is one request to a vulnerability feed for a batch of
//! dependencies. [`AdvisoryClient`] drives a source over a whole dependency
//! list: it batches, bounds concurrency, retries transient failures, backs off
//! when rate limited, and turns whatever is left into per-dependency
//! [`QueryOutcome::Failure`]s.

mod osv;
mod retry;

pub use osv::{parse_cvss_score, OsvSource, DEFAULT_BASE_URL};
pub use retry::RetryPolicy;

use crate::error::{FeedError, ScanError};
use crate::model::{Dependency, FailureKind, QueryOutcome, VulnerabilityRecord};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[async_trait]
pub trait AdvisorySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Largest batch the feed accepts in one request.
    fn max_batch_size(&self) -> usize;

    /// Queries the feed once. On success the returned list holds one entry
    /// per input dependency, in input order.
    async fn query_batch(
        &self,
        dependencies: &[Dependency],
    ) -> Result<Vec<Vec<VulnerabilityRecord>>, FeedError>;
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum number of batches in flight.
    pub concurrency: usize,
    pub batch_size: usize,
    /// Bound on a single attempt, including response decoding.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Re-query members of a failed batch one by one.
    pub split_failed_batches: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            batch_size: 100,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            split_failed_batches: true,
        }
    }
}

pub struct AdvisoryClient {
    source: Arc<dyn AdvisorySource>,
    options: ClientOptions,
}

impl AdvisoryClient {
    pub fn new(source: Arc<dyn AdvisorySource>, options: ClientOptions) -> Self {
        Self { source, options }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Queries every dependency and returns one outcome per dependency, in
    /// input order.
    ///
    /// Per-dependency failures are reported as [`QueryOutcome::Failure`].
    /// The only error is [`ScanError::Cancelled`], returned as soon as
    /// `cancel` fires; in-flight requests are dropped.
    pub async fn query_all(
        &self,
        dependencies: &[Dependency],
        cancel: &CancellationToken,
    ) -> Result<Vec<QueryOutcome>, ScanError> {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        if dependencies.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self
            .options
            .batch_size
            .min(self.source.max_batch_size())
            .max(1);
        let concurrency = self.options.concurrency.max(1);

        debug!(
            source = self.source.name(),
            dependencies = dependencies.len(),
            batch_size,
            concurrency,
            "querying advisory feed"
        );

        let mut slots: Vec<Option<QueryOutcome>> = vec![None; dependencies.len()];

        let mut pending = pin!(stream::iter(
            dependencies
                .chunks(batch_size)
                .enumerate()
                .map(|(index, batch)| (index * batch_size, batch))
        )
        .map(|(offset, batch)| async move { (offset, self.query_batch(batch, cancel).await) })
        .buffer_unordered(concurrency));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ScanError::Cancelled),
                next = pending.next() => match next {
                    Some((offset, outcomes)) => {
                        for (i, outcome) in outcomes.into_iter().enumerate() {
                            slots[offset + i] = Some(outcome);
                        }
                    }
                    None => break,
                },
            }
        }

        Ok(slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    QueryOutcome::failure(FailureKind::NetworkError, "query did not complete")
                })
            })
            .collect())
    }

    /// Resolves one batch to exactly `batch.len()` outcomes.
    async fn query_batch(
        &self,
        batch: &[Dependency],
        cancel: &CancellationToken,
    ) -> Vec<QueryOutcome> {
        let err = match self.fetch_with_retry(batch, cancel).await {
            Ok(records) => return records.into_iter().map(QueryOutcome::Success).collect(),
            Err(err) => err,
        };

        let splittable = batch.len() > 1
            && self.options.split_failed_batches
            && err.failure_kind() != FailureKind::RateLimited
            && !cancel.is_cancelled();

        if !splittable {
            return batch.iter().map(|_| failure_outcome(&err)).collect();
        }

        warn!(
            source = self.source.name(),
            batch_len = batch.len(),
            error = %err,
            "batch query failed, querying members individually"
        );

        let mut outcomes = Vec::with_capacity(batch.len());
        for dependency in batch {
            let outcome = match self
                .fetch_with_retry(std::slice::from_ref(dependency), cancel)
                .await
            {
                Ok(mut records) => QueryOutcome::Success(records.pop().unwrap_or_default()),
                Err(err) => {
                    warn!(dependency = %dependency, error = %err, "advisory query failed");
                    failure_outcome(&err)
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn fetch_with_retry(
        &self,
        batch: &[Dependency],
        cancel: &CancellationToken,
    ) -> Result<Vec<Vec<VulnerabilityRecord>>, FeedError> {
        let policy = &self.options.retry;
        let mut network_failures = 0u32;
        let mut rate_limited = 0u32;

        loop {
            let err = match self.attempt(batch).await {
                Ok(records) => {
                    if network_failures + rate_limited > 0 {
                        debug!(
                            batch_len = batch.len(),
                            retries = network_failures + rate_limited,
                            "advisory query succeeded after retries"
                        );
                    }
                    return Ok(records);
                }
                Err(err) => err,
            };

            let delay = match err {
                FeedError::RateLimited { retry_after } => {
                    rate_limited += 1;
                    if rate_limited >= policy.rate_limit_attempts {
                        return Err(err);
                    }
                    policy.rate_limit_backoff(rate_limited, retry_after)
                }
                _ if err.is_retryable() => {
                    network_failures += 1;
                    if network_failures >= policy.network_attempts {
                        return Err(FeedError::Network(format!(
                            "{} (gave up after {} attempts)",
                            err, network_failures
                        )));
                    }
                    policy.network_backoff(network_failures)
                }
                _ => return Err(err),
            };

            warn!(
                source = self.source.name(),
                batch_len = batch.len(),
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "advisory query failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(err),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn attempt(
        &self,
        batch: &[Dependency],
    ) -> Result<Vec<Vec<VulnerabilityRecord>>, FeedError> {
        let timeout = self.options.request_timeout;
        let records = tokio::time::timeout(timeout, self.source.query_batch(batch))
            .await
            .map_err(|_| FeedError::Timeout(timeout))??;

        if records.len() != batch.len() {
            return Err(FeedError::Malformed(format!(
                "expected {} result sets, got {}",
                batch.len(),
                records.len()
            )));
        }
        Ok(records)
    }
}

fn failure_outcome(err: &FeedError) -> QueryOutcome {
    QueryOutcome::failure(err.failure_kind(), err.to_string())
}
