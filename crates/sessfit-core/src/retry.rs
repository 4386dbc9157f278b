use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy for idempotent store operations (connects, reads, probes).
/// Inserts and updates are never routed through this; replaying those could
/// double-write records.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given 1-based attempt, capped at 60s.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let capped = attempt.clamp(1, 10);
        let factor = 2_u32.saturating_pow(capped - 1);
        (self.base_delay * factor).min(Duration::from_secs(60))
    }
}

/// Runs `op` until it succeeds or the policy's attempts are exhausted.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    mut op: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    "{op_name} attempt {attempt}/{} failed: {err:#}; retrying in {delay:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err.context(format!(
                    "{op_name} failed after {} attempts",
                    policy.max_attempts
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::bail;

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(10), Duration::from_secs(60));
        assert_eq!(policy.backoff(99), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = with_retries(fast_policy(), "probe", move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    bail!("connection refused");
                }
                Ok(7)
            }
        })
        .await
        .expect("third attempt succeeds");
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let err = with_retries(fast_policy(), "probe", move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("connection refused"))
            }
        })
        .await
        .expect_err("never succeeds");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
