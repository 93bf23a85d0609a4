/// Timeouts and read retries for store calls
///
/// Every store call made on behalf of a request is bounded by a timeout so a
/// stalled database surfaces as a distinct timeout failure instead of a hung
/// request. Idempotent reads may additionally be retried with exponential
/// backoff when the failure is transient.
///
/// Writes are never retried through this module. In particular the payment
/// settlement write must not be replayed, since a retry after an ambiguous
/// failure could record the same charge twice.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::db::{retry_read, RetryPolicy};
/// use parcelhub_shared::models::rider::{Rider, RiderStatus};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let policy = RetryPolicy::default();
/// let pending = retry_read(&policy, || Rider::list_by_status(&pool, RiderStatus::Pending)).await?;
/// println!("{} riders awaiting approval", pending.len());
/// # Ok(())
/// # }
/// ```

use std::future::Future;
use std::time::Duration;

/// A store call exceeded its time budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("store call timed out after {}ms", .0.as_millis())]
pub struct StoreTimeout(pub Duration);

/// Error type for bounded store reads
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The call did not finish in time
    #[error(transparent)]
    Timeout(#[from] StoreTimeout),

    /// The database reported an error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Whether retrying the same read could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
            ),
        }
    }
}

/// Bounds a store future with a timeout
///
/// The error type only has to know how to represent a timeout, so this works
/// for plain queries (`StoreError`) as well as for whole workflows such as
/// settlement or rider transitions. Dropping an unfinished transaction rolls
/// it back.
pub async fn with_timeout<T, E, F>(limit: Duration, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<StoreTimeout>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreTimeout(limit).into()),
    }
}

/// Retry schedule for idempotent reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Upper bound for any single delay
    pub max_delay: Duration,

    /// Time budget for each attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            attempt_timeout,
            ..Default::default()
        }
    }

    /// Backoff before retry number `retry` (1-based): base * 2^(retry-1), capped
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

/// Runs an idempotent read, retrying transient failures with backoff
///
/// `op` is called once per attempt so each attempt issues a fresh query.
pub async fn retry_read<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut retry = 0;

    loop {
        let attempt = with_timeout(policy.attempt_timeout, async {
            op().await.map_err(StoreError::from)
        })
        .await;

        match attempt {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);

                tracing::warn!(
                    error = %err,
                    retry = retry,
                    delay_ms = delay.as_millis() as u64,
                    "Store read failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(300),
            attempt_timeout: Duration::from_secs(1),
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(300));
        assert_eq!(policy.delay_for(40), Duration::from_millis(300));
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout(StoreTimeout(Duration::from_secs(1))).is_transient());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!StoreError::Database(sqlx::Error::PoolClosed).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_read_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = retry_read(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_read_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            ..Default::default()
        };

        let result: Result<(), StoreError> = retry_read(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::PoolTimedOut) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Database(sqlx::Error::PoolTimedOut))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_read_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<(), StoreError> = retry_read(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_reports_elapsed_budget() {
        let limit = Duration::from_millis(100);
        let result: Result<(), StoreError> = with_timeout(limit, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        match result {
            Err(StoreError::Timeout(StoreTimeout(elapsed))) => assert_eq!(elapsed, limit),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
