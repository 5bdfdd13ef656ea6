use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::LedgerError;

/// Bounded exponential backoff for serialization conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails with something other than a conflict,
    /// or the attempts are used up.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(LedgerError::Conflict) if attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt - 1);
                    warn!(
                        operation = what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "serialization conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_until_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for(2), Duration::from_millis(40));
        assert_eq!(policy.delay_for(3), Duration::from_millis(50));
        assert_eq!(policy.delay_for(40), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };

        let result: Result<(), _> = policy
            .run("reserve", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LedgerError::Conflict) }
            })
            .await;

        assert!(matches!(result, Err(LedgerError::Conflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn business_failures_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run("reserve", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(LedgerError::InsufficientStock {
                        available: 0,
                        requested: 1,
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(LedgerError::InsufficientStock { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
