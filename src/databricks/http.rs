//! HTTP utilities for Databricks REST API calls

use super::auth::AccessToken;
use crate::error::{HaltError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Statuses retried by default
pub const RETRY_STATUSES: &[u16] = &[403, 429, 500, 502, 503, 504];

/// Sanitize response body for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Retry with exponential backoff on selected statuses and transport errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(1),
            statuses: RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// Same statuses and retry count, no sleeping between attempts
    pub fn immediate() -> Self {
        Self {
            backoff_factor: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, status: StatusCode) -> bool {
        self.statuses.contains(&status.as_u16())
    }

    /// Sleep before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.backoff_factor.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Sleep before retry `attempt` when the server asked for `retry_after`.
    /// The longer of the two wins, capped at two minutes.
    pub fn wait(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.delay(attempt);
        retry_after
            .map_or(backoff, |requested| requested.max(backoff))
            .min(MAX_BACKOFF)
    }
}

/// `Retry-After` in delta-seconds form. HTTP-dates are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Authenticated JSON client shared by every controller
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Create a client that sends `token` as a bearer credential on every request
    pub fn new(token: &AccessToken, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| HaltError::Credential("access token is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!("halt-workspace/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, retry })
    }

    /// Make a GET request with query parameters
    pub async fn get(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        self.send(Method::GET, url, query, None).await
    }

    /// Make a POST request with an optional JSON body
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        self.send(Method::POST, url, &[], body).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value> {
        self.send(Method::PUT, url, &[], Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<Value> {
        self.send(Method::DELETE, url, &[], None).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut attempt = 0;

        loop {
            tracing::debug!("{} {} (attempt {})", method, url, attempt + 1);

            let mut request = self.client.request(method.clone(), url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if attempt < self.retry.max_retries => {
                    tracing::warn!(error = %e, attempt = attempt + 1, "Request failed, retrying");
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status != StatusCode::OK
                && self.retry.should_retry(status)
                && attempt < self.retry.max_retries
            {
                let wait = self.retry.wait(attempt, retry_after(response.headers()));
                tracing::warn!(
                    status = status.as_u16(),
                    attempt = attempt + 1,
                    max_retries = self.retry.max_retries,
                    wait_ms = wait.as_millis() as u64,
                    "Retryable status from {} {}",
                    method,
                    url
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
                continue;
            }

            let text = response.text().await?;

            if status != StatusCode::OK {
                // Only log sanitized/truncated error body to avoid leaking sensitive data
                tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
                return Err(HaltError::Http {
                    status: status.as_u16(),
                    method: method.to_string(),
                    url: url.to_string(),
                });
            }

            if text.trim().is_empty() {
                return Ok(Value::Null);
            }

            return Ok(serde_json::from_str(&text)?);
        }
    }
}
