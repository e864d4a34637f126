//! Runtime configuration for the interceptor and its host

use std::path::PathBuf;
use std::time::Duration;

use crate::data::{DEFAULT_STORE_NAME, MANIFEST_PATH_PREFIX};

/// Configuration for a `ManifestInterceptor`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptorConfig {
    /// URL path prefix of requests eligible for caching
    pub path_prefix: String,
    /// Name of the cache store holding manifest responses
    pub store_name: String,
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            path_prefix: MANIFEST_PATH_PREFIX.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
        }
    }
}

/// Configuration for the CLI host
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    /// Interceptor settings
    pub interceptor: InterceptorConfig,
    /// Root directory for cache stores; `None` uses the XDG cache directory
    pub cache_dir: Option<PathBuf>,
    /// Timeout for live network requests; `None` leaves it to the network stack
    pub request_timeout: Option<Duration>,
}
