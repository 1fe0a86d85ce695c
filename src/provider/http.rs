//! Shared HTTP plumbing for the remote backends.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors (including client timeouts) → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::time::Duration;

pub fn client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// A JSON POST ready to send (and resend).
pub struct JsonPost {
    /// Backend name used in error messages, e.g. `"Ollama"`.
    pub label: &'static str,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl JsonPost {
    pub fn new(label: &'static str, url: String, body: &serde_json::Value) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(Self {
            label,
            url,
            headers,
            body: serde_json::to_vec(body)?,
        })
    }

    pub fn bearer(mut self, token: &str) -> Result<Self> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        self.headers.insert(reqwest::header::AUTHORIZATION, value);
        Ok(self)
    }
}

/// Send `post`, retrying transient failures up to `max_retries` times.
pub async fn send_with_retry(
    client: &reqwest::Client,
    post: &JsonPost,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::debug!(backend = post.label, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&post.url)
            .headers(post.headers.clone())
            .body(post.body.clone())
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return Ok(json);
                }

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    tracing::warn!(backend = post.label, %status, "transient API error");
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        post.label,
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429): fail now
                let body_text = response.text().await.unwrap_or_default();
                bail!("{} API error {}: {}", post.label, status, body_text);
            }
            Err(e) => {
                tracing::warn!(backend = post.label, error = %e, "request failed");
                last_err = Some(anyhow::anyhow!(
                    "{} connection error ({}): {}",
                    post.label,
                    post.url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} request failed after retries", post.label)))
}

/// Read a JSON array of numbers as an embedding vector.
pub fn json_vector(value: &serde_json::Value, what: &str) -> Result<Vec<f32>> {
    let arr = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid {what} response: embedding is not an array"))?;
    arr.iter()
        .enumerate()
        .map(|(i, v)| match v.as_f64() {
            Some(x) => Ok(x as f32),
            None => bail!("Invalid {what} response: embedding element {i} is not a number ({v})"),
        })
        .collect()
}
