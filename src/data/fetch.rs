//! Live network fetching
//!
//! The interceptor reaches the network through the `Fetcher` trait so tests can
//! count and script network calls. `HttpFetcher` is the reqwest-backed
//! implementation used by the CLI.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use thiserror::Error;

use super::{ManifestRequest, StoredResponse};

/// Errors that can occur when fetching from the network
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// No connection could be made to the origin
    #[error("network unreachable: {0}")]
    Unreachable(String),
}

/// Performs a live network request
///
/// Implementations return any HTTP status as a response; only transport
/// failures are errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &ManifestRequest) -> Result<StoredResponse, FetchError>;
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for std::sync::Arc<T> {
    async fn fetch(&self, request: &ManifestRequest) -> Result<StoredResponse, FetchError> {
        (**self).fetch(request).await
    }
}

/// Client for fetching responses over HTTP
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a new HttpFetcher with default settings
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a new HttpFetcher whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ManifestRequest) -> Result<StoredResponse, FetchError> {
        tracing::debug!(method = %request.method, url = %request.url, "network fetch");

        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    FetchError::Unreachable(e.to_string())
                } else {
                    FetchError::RequestFailed(e)
                }
            })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?;

        Ok(StoredResponse {
            status,
            headers,
            body,
            received_at: Utc::now(),
        })
    }
}
