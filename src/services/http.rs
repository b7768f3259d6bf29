//! Outbound HTTP helpers
//!
//! Every call to an upstream API (integration, payment aggregator, SSO,
//! bucket storage) goes through [`send_with_retry`]. Only timeouts and
//! connection failures are retried; anything the upstream actually answered
//! is returned to the caller as-is.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, warn};

use crate::utils::errors::{AppError, Result};

const USER_AGENT: &str = concat!("frsaas/", env!("CARGO_PKG_VERSION"));

/// Retry policy for upstream calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(10),
            backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Default policy with a custom per-attempt timeout
    pub fn with_timeout(timeout_seconds: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_seconds),
            ..Self::default()
        }
    }
}

/// Build the shared reqwest client used by upstream adapters
pub fn build_client(timeout_seconds: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(USER_AGENT)
        .build()?)
}

/// Send a request, retrying timeouts and connect errors.
///
/// Non-success statuses are turned into [`AppError::Http`] without retrying.
/// Requests with a streaming body cannot be cloned and are sent once.
pub async fn send_with_retry(request: RequestBuilder, policy: &RetryPolicy) -> Result<Response> {
    let attempts = policy.attempts.max(1);
    let mut last_error: Option<reqwest::Error> = None;

    for attempt in 1..=attempts {
        let Some(builder) = request.try_clone() else {
            let response = request.timeout(policy.timeout).send().await.map_err(map_final)?;
            return Ok(response.error_for_status()?);
        };

        match builder.timeout(policy.timeout).send().await {
            Ok(response) => {
                debug!(attempt, status = %response.status(), url = %response.url(), "Upstream responded");
                return Ok(response.error_for_status()?);
            }
            Err(e) if is_retryable(&e) => {
                warn!(attempt, attempts, error = %e, "Upstream request failed, retrying");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    match last_error {
        Some(e) => Err(map_final(e)),
        None => Err(AppError::request_timeout("request timeout")),
    }
}

fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

fn map_final(error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::request_timeout("request timeout")
    } else {
        AppError::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            timeout: Duration::from_millis(100),
            backoff: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(10));
        assert_eq!(policy.backoff, Duration::from_secs(2));
        assert_eq!(RetryPolicy::with_timeout(5).timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(5).unwrap();
        let response = send_with_retry(client.get(format!("{}/ping", server.uri())), &fast_policy())
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "pong");
    }

    #[tokio::test]
    async fn test_status_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(5).unwrap();
        let result = send_with_retry(client.get(server.uri()), &fast_policy()).await;
        assert_matches!(result, Err(AppError::Http(_)));
    }

    #[tokio::test]
    async fn test_timeouts_are_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(3)
            .mount(&server)
            .await;

        let client = build_client(5).unwrap();
        let result = send_with_retry(client.get(server.uri()), &fast_policy()).await;
        assert_matches!(result, Err(AppError::RequestTimeout(_)));
    }

    #[tokio::test]
    async fn test_connect_errors_exhaust_attempts() {
        let client = build_client(5).unwrap();
        let result = send_with_retry(client.get("http://127.0.0.1:9"), &fast_policy()).await;
        assert_matches!(result, Err(AppError::Http(_)) | Err(AppError::RequestTimeout(_)));
    }
}
