//! Database readiness wait
//!
//! The orchestrator only guarantees the database container has started, not
//! that it accepts connections. Poll it with exponential backoff and give up
//! once the retry budget is spent.

use std::time::Duration;

use crate::domain::ports::SchemaStore;
use crate::error::{DomainError, StartupError};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after failed attempt `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let max = self.max_delay.as_millis() as f64;
        Duration::from_millis(millis.min(max) as u64)
    }

    /// Sum of every delay the policy can sleep before giving up
    pub fn total_budget(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay_for_attempt(attempt))
            .sum()
    }
}

/// Ping the store until it answers. Returns the number of attempts used.
pub async fn wait_until_ready<S>(store: &S, policy: &RetryPolicy) -> Result<u32, StartupError>
where
    S: SchemaStore + ?Sized,
{
    let mut last_error = DomainError::Connection("no attempt made".to_string());

    for attempt in 0..policy.max_attempts {
        match store.ping().await {
            Ok(()) => {
                tracing::info!(attempts = attempt + 1, "Database is accepting connections");
                return Ok(attempt + 1);
            }
            Err(e) => {
                let remaining = policy.max_attempts - attempt - 1;
                if remaining == 0 {
                    tracing::error!(attempt = attempt + 1, error = %e, "Database still unavailable, giving up");
                    last_error = e;
                    break;
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    remaining,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Database not ready, retrying"
                );
                last_error = e;
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(StartupError::DatabaseUnavailable {
        attempts: policy.max_attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fast_retry, InMemorySchemaStore};

    #[test]
    fn delays_grow_exponentially_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(30), Duration::from_millis(1000));
    }

    #[test]
    fn total_budget_sums_sleeps_between_attempts() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(250),
            multiplier: 2.0,
        };
        // 100 + 200 + 250; no sleep after the last attempt
        assert_eq!(policy.total_budget(), Duration::from_millis(550));
    }

    #[test]
    fn default_policy_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert!(policy.total_budget() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn ready_on_first_attempt() {
        let store = InMemorySchemaStore::new();
        let attempts = wait_until_ready(&store, &fast_retry(3)).await.unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(store.ping_count(), 1);
    }

    #[tokio::test]
    async fn ready_after_database_finishes_booting() {
        let store = InMemorySchemaStore::new().with_failing_pings(3);
        let attempts = wait_until_ready(&store, &fast_retry(5)).await.unwrap();
        assert_eq!(attempts, 4);
        assert_eq!(store.ping_count(), 4);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let store = InMemorySchemaStore::new().unreachable();
        let err = wait_until_ready(&store, &fast_retry(4)).await.unwrap_err();

        assert!(matches!(
            err,
            StartupError::DatabaseUnavailable {
                attempts: 4,
                last_error: DomainError::Connection(_)
            }
        ));
        assert_eq!(store.ping_count(), 4);
    }

    #[tokio::test]
    async fn single_attempt_policy_does_not_sleep() {
        let store = InMemorySchemaStore::new().with_failing_pings(1);
        let err = wait_until_ready(&store, &fast_retry(1)).await.unwrap_err();
        assert!(matches!(err, StartupError::DatabaseUnavailable { attempts: 1, .. }));
    }
}
