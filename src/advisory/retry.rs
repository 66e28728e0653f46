// Exponential backoff with jitter for advisory feed requests
use rand::Rng;
use std::time::Duration;

/// Retry budgets and backoff parameters.
///
/// Network failures and rate limiting are counted separately: a feed that
/// keeps answering 429 is healthy but busy, so it gets a longer backoff and
/// its own attempt budget.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts allowed while failures are network-level.
    pub network_attempts: u32,
    /// Total attempts allowed while the feed answers with rate limiting.
    pub rate_limit_attempts: u32,
    pub base_delay: Duration,
    pub rate_limit_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            network_attempts: 3,
            rate_limit_attempts: 5,
            base_delay: Duration::from_millis(500),
            rate_limit_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after the `failures`-th network failure.
    pub fn network_backoff(&self, failures: u32) -> Duration {
        let delay = exponential(self.base_delay, failures).min(self.max_delay);
        delay + jitter(delay)
    }

    /// Delay before the next attempt after the `failures`-th rate-limit
    /// response. A feed-provided hint wins over the computed backoff.
    pub fn rate_limit_backoff(&self, failures: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => {
                let delay = exponential(self.rate_limit_delay, failures).min(self.max_delay);
                delay + jitter(delay)
            }
        }
    }
}

fn exponential(base: Duration, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

/// Up to half of `delay`, so concurrent workers don't retry in lockstep.
fn jitter(delay: Duration) -> Duration {
    let max_ms = (delay.as_millis() / 2) as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            network_attempts: 3,
            rate_limit_attempts: 5,
            base_delay: Duration::from_millis(100),
            rate_limit_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_network_backoff_grows_exponentially() {
        let policy = policy();
        for (failures, base_ms) in [(1, 100), (2, 200), (3, 400)] {
            let delay = policy.network_backoff(failures);
            assert!(delay >= Duration::from_millis(base_ms));
            assert!(delay <= Duration::from_millis(base_ms + base_ms / 2));
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = policy();
        let delay = policy.network_backoff(12);
        assert!(delay >= Duration::from_secs(2));
        assert!(delay <= Duration::from_secs(3));
    }

    #[test]
    fn test_rate_limit_honors_hint() {
        let policy = policy();
        assert_eq!(
            policy.rate_limit_backoff(1, Some(Duration::from_millis(750))),
            Duration::from_millis(750)
        );
        assert_eq!(
            policy.rate_limit_backoff(1, Some(Duration::from_secs(600))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_rate_limit_backoff_longer_than_network_backoff() {
        let policy = policy();
        assert!(policy.rate_limit_backoff(1, None) > policy.network_backoff(1));
    }

    #[test]
    fn test_zero_delay_has_no_jitter() {
        let policy = RetryPolicy {
            base_delay: Duration::ZERO,
            ..policy()
        };
        assert_eq!(policy.network_backoff(3), Duration::ZERO);
    }
}
