//! Request and response models for the manifest interceptor
//!
//! This module contains the request descriptor the host hands to the
//! interceptor, the identity used to key the cache store, and the response
//! value that flows back from either the store or the network.

pub mod fetch;

pub use fetch::{FetchError, Fetcher, HttpFetcher};

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

/// URL path prefix under which manifest resources are intercepted
pub const MANIFEST_PATH_PREFIX: &str = "/manifests/";

/// Name of the cache store holding manifest responses
pub const DEFAULT_STORE_NAME: &str = "dweb-resolver-cache-v1";

/// An outbound network request observed by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRequest {
    /// HTTP method of the request
    pub method: Method,
    /// Absolute URL being requested
    pub url: Url,
}

impl ManifestRequest {
    /// Creates a request with an explicit method
    pub fn new(method: Method, url: Url) -> Self {
        Self { method, url }
    }

    /// Creates a GET request for the given URL
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parses `url` and creates a GET request for it
    pub fn parse_get(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(Self::get)
    }

    /// Returns true if the request is eligible for interception under `prefix`
    ///
    /// Only GET requests whose URL path starts with the prefix qualify.
    pub fn is_in_scope(&self, prefix: &str) -> bool {
        self.method == Method::GET && self.url.path().starts_with(prefix)
    }

    /// Identity of this request in the cache store
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Cache store identity of a request: method plus URL, headers excluded
///
/// The URL fragment is dropped since it never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestKey(String);

impl RequestKey {
    /// Builds the identity for `method` and `url`
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("{} {}", method.as_str(), url))
    }

    /// Returns the identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A complete HTTP response, either stored or freshly fetched
///
/// The body is held as `Bytes`, so a clone is an independent readable copy
/// of the same content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers in the order received
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
    /// When the response was received from the network
    pub received_at: DateTime<Utc>,
}

impl StoredResponse {
    /// Creates a response with no headers, received now
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    /// Adds a header to the response
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true for any 2xx status
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up the first header named `name`, ignoring ASCII case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
