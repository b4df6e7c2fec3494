//! Query timeout and retry utilities for warehouse calls

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::GatewayError;

/// Timeout and retry settings applied to every warehouse query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout
    pub query_timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff before the first retry, doubled per attempt
    pub base_backoff: Duration,
    /// Upper bound on the backoff before jitter
    pub max_backoff: Duration,
    /// Whether a failure after the statement may have reached the warehouse
    /// (timeout, broken connection) can be retried
    pub idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(60),
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(5000),
            idempotent: true,
        }
    }
}

impl RetryPolicy {
    /// Same policy for statements that must not run twice
    ///
    /// Only failures that happen before the statement is sent are retried.
    pub fn for_writes(self) -> Self {
        Self {
            idempotent: false,
            ..self
        }
    }

    /// Retry backoff with exponential growth, cap, and jitter
    ///
    /// `backoff = min(base * 2^attempt, max) + random_jitter(0-100ms)`
    ///
    /// With defaults (base=500ms, max=5000ms):
    /// - Attempt 0: 500-600ms
    /// - Attempt 1: 1000-1100ms
    /// - Attempt 4+: 5000-5100ms (capped)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_backoff.as_millis() as u64;
        let max_ms = self.max_backoff.as_millis() as u64;

        let jitter = rand::random::<u64>() % 100;
        let grown = base_ms.saturating_mul(2_u64.saturating_pow(attempt));

        Duration::from_millis(grown.min(max_ms) + jitter)
    }
}

/// Execute a warehouse operation with timeout protection and automatic retry
///
/// Connection-class errors and timeouts are retried up to
/// `policy.max_retries` times; any other error is returned immediately. A
/// non-idempotent policy retries only pool errors raised before the statement
/// was sent, and reports a timeout after the first attempt.
///
/// # Example
///
/// ```rust
/// # use warehouse_gateway::timeout::{RetryPolicy, execute_with_timeout};
/// # async fn example() -> Result<(), warehouse_gateway::error::GatewayError> {
/// let rows = execute_with_timeout(
///     &RetryPolicy::default(),
///     || async { Ok::<Vec<()>, sqlx::Error>(vec![]) },
///     "Listing databases",
/// ).await?;
/// # assert!(rows.is_empty());
/// # Ok(())
/// # }
/// ```
pub async fn execute_with_timeout<T, F, Fut>(
    policy: &RetryPolicy,
    query_fn: F,
    operation_description: &str,
) -> Result<T, GatewayError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let max_retries = policy.max_retries;

    for attempt in 0..=max_retries {
        match timeout(policy.query_timeout, query_fn()).await {
            Ok(Ok(result)) => return Ok(result),
            Ok(Err(sqlx_err)) => {
                let retryable = if policy.idempotent {
                    is_connection_error(&sqlx_err)
                } else {
                    is_unsent_error(&sqlx_err)
                };

                if retryable && attempt < max_retries {
                    log::warn!(
                        "Connection error on attempt {}/{}: {}. Retrying...",
                        attempt + 1,
                        max_retries + 1,
                        sqlx_err
                    );
                    tokio::time::sleep(policy.backoff(attempt)).await;
                    continue;
                }

                if is_connection_error(&sqlx_err) {
                    return Err(GatewayError::ConnectionError(format!(
                        "{}: {}",
                        operation_description, sqlx_err
                    )));
                }

                return Err(GatewayError::QueryError(format!(
                    "{}: {}",
                    operation_description, sqlx_err
                )));
            }
            Err(_elapsed) => {
                if !policy.idempotent {
                    return Err(GatewayError::QueryError(format!(
                        "{} timed out after {:?} and was not retried; \
                         the statement may still have been applied",
                        operation_description, policy.query_timeout
                    )));
                }
                if attempt < max_retries {
                    log::warn!(
                        "Timeout on attempt {}/{}. Retrying...",
                        attempt + 1,
                        max_retries + 1
                    );
                    tokio::time::sleep(policy.backoff(attempt)).await;
                    continue;
                }
            }
        }
    }

    Err(GatewayError::QueryError(format!(
        "{} timed out after {:?} ({} attempts). \
         The query may be too slow or the warehouse may be overloaded.\n\
         Suggestions:\n\
         • Add a WHERE clause or LIMIT to reduce the scanned data\n\
         • Use a larger warehouse\n\
         • Increase the timeout with --query-timeout-secs",
        operation_description,
        policy.query_timeout,
        max_retries + 1
    )))
}

/// Pool errors raised before any statement reached the warehouse
fn is_unsent_error(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut)
}

/// Check if a sqlx error is connection-related and retryable
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
        sqlx::Error::Database(db_err) => {
            let msg = db_err.message().to_lowercase();
            msg.contains("connection")
                || msg.contains("broken pipe")
                || msg.contains("reset by peer")
                || msg.contains("closed")
                || msg.contains("session")
        }
        _ => false,
    }
}
