//! HTTP retry with exponential backoff for transient errors.
//!
//! Connectors call [`send_json`] instead of `reqwest::RequestBuilder::send()`
//! directly, so every request gets the same policy: HTTP 429 and 5xx (and
//! transport-level timeouts/resets) are retried up to [`MAX_RETRIES`] times
//! with exponential backoff, any other 4xx fails immediately, and a
//! `Retry-After` header shortens or lengthens the wait when the server
//! provides one.
//!
//! The backoff loop itself ([`run_with_backoff`]) is generic over the
//! attempted operation, which keeps the retry bound testable without a
//! network.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;

use crate::SourceError;

/// Maximum number of retry attempts for transient errors. With exponential
/// backoff (2s, 4s, 8s, 16s, 32s) the total wait before giving up is 62
/// seconds.
const MAX_RETRIES: u32 = 5;

/// What a single attempt produced, as classified by the operation.
enum AttemptOutcome<T> {
    /// The attempt succeeded.
    Success(T),
    /// The attempt failed in a way worth retrying.
    Transient {
        status: Option<StatusCode>,
        retry_after: Option<Duration>,
    },
    /// The attempt failed permanently; retrying cannot help.
    Fatal(SourceError),
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt to construct a
/// fresh [`reqwest::RequestBuilder`], since builders are consumed by
/// `.send()`. `label` identifies the connector in logs and errors.
///
/// # Errors
///
/// Returns [`SourceError::RetriesExhausted`] when transient failures
/// persist through every attempt, [`SourceError::Fetch`] on a
/// non-retryable error status, and [`SourceError::Http`] on transport
/// errors that are not transient or on an unparseable body.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(label: &str, build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let build_request = &build_request;
    run_with_backoff(label, move || async move {
        match build_request().send().await {
            Err(e) if is_transient(&e) => AttemptOutcome::Transient {
                status: e.status(),
                retry_after: None,
            },
            Err(e) => AttemptOutcome::Fatal(SourceError::Http(e)),
            Ok(response) => {
                let status = response.status();

                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    return AttemptOutcome::Transient {
                        status: Some(status),
                        retry_after: retry_after_hint(response.headers()),
                    };
                }

                // 4xx other than 429 is permanent.
                if status.is_client_error() {
                    return AttemptOutcome::Fatal(SourceError::Fetch {
                        source_id: label.to_string(),
                        message: format!("HTTP {status}"),
                    });
                }

                match response.json::<serde_json::Value>().await {
                    Ok(value) => AttemptOutcome::Success(value),
                    Err(e) => AttemptOutcome::Fatal(SourceError::Http(e)),
                }
            }
        }
    })
    .await
}

/// Core backoff loop shared by [`send_json`] and the tests.
///
/// Runs `op` until it succeeds, fails permanently, or transient failures
/// exhaust `1 + MAX_RETRIES` attempts.
async fn run_with_backoff<T, F, Fut>(label: &str, mut op: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AttemptOutcome<T>>,
{
    let mut last_status = None;

    for attempt in 0..=MAX_RETRIES {
        match op().await {
            AttemptOutcome::Success(value) => return Ok(value),
            AttemptOutcome::Fatal(e) => return Err(e),
            AttemptOutcome::Transient {
                status,
                retry_after,
            } => {
                last_status = status;
                if attempt < MAX_RETRIES {
                    let delay = retry_after
                        .unwrap_or_else(|| Duration::from_secs(1u64 << (attempt + 1)));
                    log::warn!(
                        "{label}: transient failure (status: {status:?}), retry {}/{MAX_RETRIES} in {delay:?}...",
                        attempt + 1,
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(SourceError::RetriesExhausted {
        status: last_status,
        attempts: MAX_RETRIES + 1,
    })
}

/// Returns `true` if the transport error is likely transient.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

/// Parses an integral `Retry-After` header into a wait duration.
///
/// The HTTP-date form of the header is ignored; the servers this tool
/// talks to send seconds.
fn retry_after_hint(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn unavailable<T>() -> AttemptOutcome<T> {
        AttemptOutcome::Transient {
            status: Some(StatusCode::SERVICE_UNAVAILABLE),
            retry_after: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fifth_attempt() {
        let calls = Cell::new(0u32);

        let result = run_with_backoff("test", || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n < 5 {
                    unavailable()
                } else {
                    AttemptOutcome::Success(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 5);
        assert_eq!(calls.get(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_six_consecutive_failures() {
        let calls = Cell::new(0u32);

        let result: Result<(), SourceError> = run_with_backoff("test", || {
            calls.set(calls.get() + 1);
            async { unavailable() }
        })
        .await;

        assert_eq!(calls.get(), 6);
        match result {
            Err(SourceError::RetriesExhausted { status, attempts }) => {
                assert_eq!(status, Some(StatusCode::SERVICE_UNAVAILABLE));
                assert_eq!(attempts, 6);
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let calls = Cell::new(0u32);

        let result: Result<(), SourceError> = run_with_backoff("test", || {
            calls.set(calls.get() + 1);
            async {
                AttemptOutcome::Fatal(SourceError::Fetch {
                    source_id: "test".to_string(),
                    message: "HTTP 404 Not Found".to_string(),
                })
            }
        })
        .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(SourceError::Fetch { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn honors_retry_after_hint() {
        let started = tokio::time::Instant::now();
        let calls = Cell::new(0u32);

        let result = run_with_backoff("test", || {
            let n = calls.get() + 1;
            calls.set(n);
            async move {
                if n == 1 {
                    AttemptOutcome::Transient {
                        status: Some(StatusCode::TOO_MANY_REQUESTS),
                        retry_after: Some(Duration::from_secs(30)),
                    }
                } else {
                    AttemptOutcome::Success(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[test]
    fn parses_integral_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(RETRY_AFTER, "17".parse().unwrap());
        assert_eq!(retry_after_hint(&headers), Some(Duration::from_secs(17)));
    }

    #[test]
    fn ignores_http_date_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after_hint(&headers), None);
    }
}
