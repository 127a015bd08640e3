use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::detector::{DocumentKind, detect_document_kind};
use super::error::TransportError;

pub const DEFAULT_BASE_URL: &str = "https://web-api.tp.entsoe.eu/api";

const BODY_SNIPPET_LEN: usize = 512;

/// Raw GET against the API; returns the response body as text
///
/// `params` never contains the security token, implementations add it.
#[async_trait]
pub trait EntsoeTransport: Send + Sync {
    async fn get(&self, params: &[(&'static str, String)]) -> Result<String, TransportError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            retryable_statuses: vec![429, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Wait before retry `n` (0-based): `min(base * multiplier^n, max)`
    pub fn delay_for_attempt(&self, n: u32) -> Duration {
        let factor = self.multiplier.powi(n.min(i32::MAX as u32) as i32);
        let millis = self.base_delay.as_millis() as f64 * factor;
        let max_millis = self.max_delay.as_millis() as f64;

        if !millis.is_finite() || millis >= max_millis {
            self.max_delay
        } else {
            Duration::from_millis(millis.max(0.0) as u64)
        }
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Wait before retry `retry_index` after `error`; a Retry-After hint wins
    /// over the backoff schedule but is capped at `max_delay`
    pub fn wait_before_retry(&self, error: &TransportError, retry_index: u32) -> Duration {
        match error {
            TransportError::RateLimited {
                retry_after_secs: Some(secs),
                ..
            } => Duration::from_secs(*secs).min(self.max_delay),
            _ => self.delay_for_attempt(retry_index),
        }
    }

    /// Calls `send` with the 1-based attempt number until it succeeds, fails
    /// with a non-retryable error or `max_attempts` is reached
    pub async fn run<T, F, Fut>(&self, mut send: F) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match send(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let wait = self.wait_before_retry(&e, attempt - 1);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Retrying ENTSO-E request"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub api_token: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl TransportConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: api_token.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: format!("entsoe-backend/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
        }
    }
}

// Keeps the token out of logs
impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .finish()
    }
}

/// reqwest-backed transport with exponential backoff
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_token: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url,
            api_token: config.api_token,
            retry: config.retry,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn send_once(
        &self,
        params: &[(&'static str, String)],
        attempt: u32,
    ) -> Result<String, TransportError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("securityToken", self.api_token.as_str())])
            .send()
            .await
            .map_err(|e| classify_send_error(e, attempt))?;

        let status = response.status();
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| classify_send_error(e, attempt))?;

        if status.is_success() {
            return Ok(body);
        }

        let code = status.as_u16();

        if self.retry.is_retryable_status(code) {
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                TransportError::RateLimited {
                    attempts: attempt,
                    retry_after_secs,
                }
            } else {
                TransportError::Server {
                    attempts: attempt,
                    status: code,
                    body: snippet(&body),
                }
            });
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(TransportError::Authentication { status: code })
            }
            StatusCode::NOT_FOUND => Err(TransportError::NotFound),
            // Invalid queries and empty results come back as 400 + acknowledgement
            StatusCode::BAD_REQUEST
                if matches!(
                    detect_document_kind(&body),
                    Ok(DocumentKind::AcknowledgementMarket)
                ) =>
            {
                Ok(body)
            }
            _ => Err(TransportError::UnexpectedStatus {
                status: code,
                body: snippet(&body),
            }),
        }
    }
}

#[async_trait]
impl EntsoeTransport for HttpTransport {
    async fn get(&self, params: &[(&'static str, String)]) -> Result<String, TransportError> {
        let body = self
            .retry
            .run(|attempt| self.send_once(params, attempt))
            .await?;
        tracing::debug!(bytes = body.len(), "ENTSO-E response received");
        Ok(body)
    }
}

fn classify_send_error(error: reqwest::Error, attempt: u32) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout { attempts: attempt }
    } else if error.is_connect() || error.is_request() || error.is_body() {
        TransportError::Connection {
            attempts: attempt,
            source: error.without_url(),
        }
    } else {
        TransportError::Request(error.without_url())
    }
}

// Bodies can be megabytes of XML
fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        return body.to_string();
    }
    let mut end = BODY_SNIPPET_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(60));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }

    fn server_error(attempt: u32) -> TransportError {
        TransportError::Server {
            attempts: attempt,
            status: 503,
            body: String::new(),
        }
    }

    fn whole_seconds(offsets: &[Duration]) -> Vec<u64> {
        offsets.iter().map(Duration::as_secs).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_backoff_waits_one_then_two_seconds() {
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();
        let mut attempts_at = Vec::new();

        let body = policy
            .run(|attempt| {
                attempts_at.push(started.elapsed());
                async move {
                    if attempt < 3 {
                        Err(server_error(attempt))
                    } else {
                        Ok("body".to_string())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(body, "body");
        assert_eq!(whole_seconds(&attempts_at), vec![0, 1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_make_no_fourth_attempt() {
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();
        let mut attempts_at = Vec::new();

        let err = policy
            .run(|attempt| {
                attempts_at.push(started.elapsed());
                async move { Err::<String, _>(server_error(attempt)) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Server { attempts: 3, .. }));
        assert_eq!(whole_seconds(&attempts_at), vec![0, 1, 3]);
        // No wait is spent after the final attempt
        assert_eq!(started.elapsed().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff_and_is_capped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        let started = tokio::time::Instant::now();
        let mut attempts_at = Vec::new();

        policy
            .run(|attempt| {
                attempts_at.push(started.elapsed());
                async move {
                    match attempt {
                        1 => Err(TransportError::RateLimited {
                            attempts: attempt,
                            retry_after_secs: Some(5),
                        }),
                        2 => Err(TransportError::RateLimited {
                            attempts: attempt,
                            retry_after_secs: Some(3600),
                        }),
                        _ => Ok(()),
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(whole_seconds(&attempts_at), vec![0, 5, 15]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_returned_without_waiting() {
        let policy = RetryPolicy::default();
        let started = tokio::time::Instant::now();
        let mut calls = 0;

        let err = policy
            .run(|_| {
                calls += 1;
                async { Err::<(), _>(TransportError::NotFound) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::NotFound));
        assert_eq!(calls, 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_retryable_statuses() {
        let policy = RetryPolicy::default();
        for status in [429, 502, 503, 504] {
            assert!(policy.is_retryable_status(status));
        }
        for status in [400, 401, 403, 404, 500] {
            assert!(!policy.is_retryable_status(status));
        }
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let body = "é".repeat(600);
        let cut = snippet(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= BODY_SNIPPET_LEN + 3);
        assert_eq!(snippet("short"), "short");
    }
}
