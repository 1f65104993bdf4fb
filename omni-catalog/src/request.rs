use std::{future::Future, time::Duration};

use serde::de::DeserializeOwned;

use crate::{ClientError, ClientResult, RetryPolicy};

/// Run `call` until it succeeds, fails fatally, or the attempt ceiling is hit.
///
/// Rate limiting sleeps for the catalog-specified backoff before the next
/// attempt; transient transport errors are retried immediately.
pub(crate) async fn with_retries<T, F, Fut>(
    provider: &'static str,
    policy: RetryPolicy,
    mut call: F,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    for attempt in 1..=policy.max_attempts {
        match call().await {
            Ok(value) => return Ok(value),
            Err(ClientError::RateLimited { retry_after }) => {
                tracing::warn!(
                    "[{provider}] Rate limit reached. Retrying in {} seconds... (attempt {attempt}/{})",
                    retry_after.as_secs(),
                    policy.max_attempts
                );
                tokio::time::sleep(retry_after).await;
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    "[{provider}] Request failed (attempt {attempt}/{}): {e}",
                    policy.max_attempts
                );
            }
            Err(e) => return Err(e),
        }
    }
    Err(ClientError::MaxRetries { provider })
}

/// Turn a response into its body, mapping error statuses.
///
/// A 429 becomes [`ClientError::RateLimited`] using the `Retry-After` header,
/// falling back to `default_backoff`.
pub(crate) async fn checked_bytes(
    provider: &'static str,
    response: reqwest::Response,
    default_backoff: Duration,
) -> ClientResult<bytes::Bytes> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(default_backoff);
        return Err(ClientError::RateLimited { retry_after });
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(response.url().to_string()));
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ClientError::ApiError {
            provider,
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.bytes().await?)
}

pub(crate) fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> ClientResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried_until_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retries("test", RetryPolicy::default(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ClientError::RateLimited {
                    retry_after: Duration::from_secs(3),
                })
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_attempts() {
        let calls = AtomicUsize::new(0);
        let result: ClientResult<()> = with_retries("test", RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::RateLimited {
                retry_after: Duration::from_secs(1),
            })
        })
        .await;
        assert!(matches!(result, Err(ClientError::MaxRetries { provider: "test" })));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: ClientResult<()> = with_retries("test", RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::NotFound("track/1".to_string()))
        })
        .await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
