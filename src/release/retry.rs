//! Retry logic with exponential backoff for network operations.

use crate::error::{ReleaseError, Result};
use tokio::time::{Duration, Instant};

/// Maximum backoff time in seconds
const MAX_BACKOFF_SECONDS: u64 = 60;

/// Default absolute timeout for one retried operation
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Retry an async operation with exponential backoff
///
/// Recoverable errors (network failures, rate limits, 5xx) are retried after
/// 1s, 2s, 4s, ... Unrecoverable errors return immediately.
///
/// `max_retries` of 0 means a single attempt.
pub async fn retry_with_backoff<F, T, Fut>(
    mut operation: F,
    max_retries: u32,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let deadline = Instant::now() + DEFAULT_TIMEOUT;
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempts > 0 {
                    log::info!("{} succeeded after {} retry(ies)", operation_name, attempts);
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_recoverable() {
                    return Err(e);
                }

                if attempts >= max_retries {
                    log::error!("{} failed after {} attempt(s)", operation_name, attempts + 1);
                    return Err(e);
                }

                attempts += 1;

                let wait_seconds = 2u64.saturating_pow(attempts - 1).min(MAX_BACKOFF_SECONDS);
                let remaining = deadline.saturating_duration_since(Instant::now());
                let wait = Duration::from_secs(wait_seconds).min(remaining);

                if wait.is_zero() {
                    return Err(ReleaseError::Anyhow(anyhow::anyhow!(
                        "{} timed out after {} attempt(s): {}",
                        operation_name,
                        attempts,
                        e
                    )));
                }

                log::warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:.1}s",
                    operation_name,
                    attempts,
                    max_retries + 1,
                    e,
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn network_error() -> ReleaseError {
        PublishError::Network {
            operation: "test".to_string(),
            reason: "reset".to_string(),
        }
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn retries_recoverable_errors() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(network_error())
                } else {
                    Ok(7)
                }
            },
            3,
            "flaky",
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unrecoverable_errors_return_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(PublishError::TagExists { tag: "v1".to_string() }.into())
            },
            5,
            "create",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(network_error())
            },
            2,
            "down",
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
