//! Page-fetch transport shared by the provider clients
//!
//! Classifies reqwest failures into transient/permanent and applies the
//! bounded retry policy to every GET.

use crate::error::ProviderError;
use crate::providers::retry::{with_retry, RetryPolicy};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// User-Agent sent with every request
pub const USER_AGENT: &str = concat!(
    "plexunify/",
    env!("CARGO_PKG_VERSION"),
    " (catalog metadata reconciliation)"
);

/// Retrying GET client
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    rate_limiter: Option<governor::DefaultDirectRateLimiter>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Permanent(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry,
            rate_limiter: None,
        })
    }

    /// Wait for `limiter` before every attempt
    pub fn with_rate_limiter(mut self, limiter: governor::DefaultDirectRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        label: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let body = self.get_bytes(label, url, query).await?;
        serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Permanent(format!("{}: unexpected response: {}", label, e)))
    }

    /// GET a text body
    pub async fn get_text(
        &self,
        label: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String, ProviderError> {
        let body = self.get_bytes(label, url, query).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// GET a raw body with retry
    pub async fn get_bytes(
        &self,
        label: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<u8>, ProviderError> {
        with_retry(label, self.retry, move || self.get_once(url, query)).await
    }

    async fn get_once(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<u8>, ProviderError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, url));
        }

        let body = response.bytes().await.map_err(classify_error)?;
        Ok(body.to_vec())
    }
}

/// Map a transport error to a provider error
pub fn classify_error(err: reqwest::Error) -> ProviderError {
    if err.is_decode() || err.is_builder() {
        ProviderError::Permanent(err.to_string())
    } else {
        // Timeouts, refused connections, resets mid-body
        ProviderError::Transient(err.to_string())
    }
}

/// Map a non-success HTTP status to a provider error
pub fn classify_status(status: StatusCode, url: &str) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        ProviderError::Transient(format!("{} returned {}", url, status))
    } else {
        ProviderError::Permanent(format!("{} returned {}", url, status))
    }
}
