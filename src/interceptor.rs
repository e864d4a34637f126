//! Cache-first manifest interceptor
//!
//! GET requests under the manifest path prefix are answered from the cache
//! store when an entry exists. On a miss the request goes to the network and
//! a successful response is stored before it is returned. Everything else is
//! passed through untouched.
//!
//! Entries never expire here and HTTP caching headers are ignored; a stored
//! manifest is served until it is evicted or its store is deleted.

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::{CacheStore, StoreError};
use crate::config::InterceptorConfig;
use crate::data::{FetchError, Fetcher, ManifestRequest, StoredResponse};
use crate::lifecycle::{LifecycleSignals, Worker};

/// Errors that can occur while producing an intercepted response
#[derive(Debug, Error)]
pub enum InterceptError {
    /// The cache store could not be read or written
    #[error("cache store failed: {0}")]
    Store(#[from] StoreError),

    /// The fallback network fetch failed
    #[error("network fetch failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

/// A response produced for a request, tagged with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: StoredResponse,
    pub source: ResponseSource,
}

/// Outcome of offering a request to the interceptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Not ours: the host sends the request on the normal network path
    PassThrough,
    /// The interceptor produced the response
    Respond(Served),
}

/// Serves manifest requests cache-first and refills the cache from the network
///
/// The interceptor holds no state besides the injected store and fetcher, so
/// a shared reference can serve any number of requests at once.
#[derive(Debug)]
pub struct ManifestInterceptor<S, F> {
    store: S,
    fetcher: F,
    config: InterceptorConfig,
}

impl<S: CacheStore, F: Fetcher> ManifestInterceptor<S, F> {
    /// Creates an interceptor with the default manifest prefix
    pub fn new(store: S, fetcher: F) -> Self {
        Self::with_config(store, fetcher, InterceptorConfig::default())
    }

    pub fn with_config(store: S, fetcher: F, config: InterceptorConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    /// Offers a request to the interceptor
    ///
    /// # Returns
    /// * `Ok(Interception::PassThrough)` for anything but GET under the prefix;
    ///   the store is not touched
    /// * `Ok(Interception::Respond(_))` with the cached or freshly fetched response
    /// * `Err(InterceptError)` if the store fails or the network fetch fails
    pub async fn handle(&self, request: &ManifestRequest) -> Result<Interception, InterceptError> {
        if !request.is_in_scope(&self.config.path_prefix) {
            tracing::trace!(method = %request.method, url = %request.url, "pass through");
            return Ok(Interception::PassThrough);
        }

        self.cache_first(request).await.map(Interception::Respond)
    }

    async fn cache_first(&self, request: &ManifestRequest) -> Result<Served, InterceptError> {
        let key = request.key();

        if let Some(response) = self.store.get(&key).await? {
            tracing::debug!(%key, status = response.status, "cache hit");
            return Ok(Served {
                response,
                source: ResponseSource::Cache,
            });
        }

        tracing::debug!(%key, "cache miss, fetching");
        let response = self.fetcher.fetch(request).await?;

        if response.is_ok() {
            self.store.put(&key, response.clone()).await?;
            tracing::info!(%key, status = response.status, "cached manifest");
        } else {
            tracing::debug!(%key, status = response.status, "not caching unsuccessful response");
        }

        Ok(Served {
            response,
            source: ResponseSource::Network,
        })
    }
}

#[async_trait]
impl<S: CacheStore, F: Fetcher> Worker for ManifestInterceptor<S, F> {
    async fn on_install(&self, signals: &LifecycleSignals) {
        tracing::debug!(store = %self.config.store_name, "installing, skipping wait");
        signals.skip_waiting();
    }

    async fn on_activate(&self, signals: &LifecycleSignals) {
        tracing::debug!(store = %self.config.store_name, "activating, claiming clients");
        signals.claim_clients();
    }

    async fn on_fetch(&self, request: &ManifestRequest) -> Result<Interception, InterceptError> {
        self.handle(request).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::data::RequestKey;
    use reqwest::{Method, Url};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Barrier;

    /// Scripted network: fixed status/body per path, counts every call
    #[derive(Default)]
    pub(crate) struct FakeNetwork {
        routes: HashMap<String, (u16, String)>,
        unreachable: bool,
        numbered: bool,
        calls: AtomicUsize,
        barrier: Option<Barrier>,
    }

    impl FakeNetwork {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn route(mut self, path: &str, status: u16, body: &str) -> Self {
            self.routes.insert(path.to_string(), (status, body.to_string()));
            self
        }

        pub(crate) fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        /// Holds every fetch until `n` fetches are in flight, and tags each
        /// body with its call number so the results can be told apart
        fn rendezvous(mut self, n: usize) -> Self {
            self.barrier = Some(Barrier::new(n));
            self.numbered = true;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeNetwork {
        async fn fetch(&self, request: &ManifestRequest) -> Result<StoredResponse, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            if self.unreachable {
                return Err(FetchError::Unreachable(request.url.to_string()));
            }
            match self.routes.get(request.url.path()) {
                Some((status, body)) if self.numbered => {
                    Ok(StoredResponse::new(*status, format!("{}#{}", body, call)))
                }
                Some((status, body)) => Ok(StoredResponse::new(*status, body.clone())),
                None => Ok(StoredResponse::new(404, "not found")),
            }
        }
    }

    /// Wraps a store and records every access
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryStore,
        accesses: Mutex<Vec<&'static str>>,
    }

    impl RecordingStore {
        fn accesses(&self) -> Vec<&'static str> {
            self.accesses.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn get(&self, key: &RequestKey) -> Result<Option<StoredResponse>, StoreError> {
            self.accesses.lock().unwrap().push("get");
            self.inner.get(key).await
        }

        async fn put(&self, key: &RequestKey, response: StoredResponse) -> Result<(), StoreError> {
            self.accesses.lock().unwrap().push("put");
            self.inner.put(key, response).await
        }

        async fn delete(&self, key: &RequestKey) -> Result<bool, StoreError> {
            self.accesses.lock().unwrap().push("delete");
            self.inner.delete(key).await
        }

        async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
            self.inner.keys().await
        }
    }

    /// A store whose every access fails
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &RequestKey) -> Result<Option<StoredResponse>, StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn put(&self, _key: &RequestKey, _response: StoredResponse) -> Result<(), StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn delete(&self, _key: &RequestKey) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable)
        }

        async fn keys(&self) -> Result<Vec<RequestKey>, StoreError> {
            Err(StoreError::Unavailable)
        }
    }

    fn get(path: &str) -> ManifestRequest {
        ManifestRequest::parse_get(&format!("https://resolver.local{}", path)).unwrap()
    }

    fn served(interception: Interception) -> Served {
        match interception {
            Interception::Respond(served) => served,
            Interception::PassThrough => panic!("expected the interceptor to respond"),
        }
    }

    #[tokio::test]
    async fn test_cold_cache_fetches_once_and_stores() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(FakeNetwork::new().route("/manifests/app.json", 200, r#"{"v":1}"#));
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        let result = served(interceptor.handle(&get("/manifests/app.json")).await.unwrap());

        assert_eq!(result.source, ResponseSource::Network);
        assert_eq!(&result.response.body[..], br#"{"v":1}"#);
        assert_eq!(network.calls(), 1);
        assert_eq!(store.keys().await.unwrap(), vec![get("/manifests/app.json").key()]);

        let stored = store.get(&get("/manifests/app.json").key()).await.unwrap().unwrap();
        assert_eq!(stored, result.response, "Stored copy should match returned copy");
    }

    #[tokio::test]
    async fn test_warm_cache_serves_without_network() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(FakeNetwork::new().route("/manifests/app.json", 200, r#"{"v":1}"#));
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        let first = served(interceptor.handle(&get("/manifests/app.json")).await.unwrap());
        let second = served(interceptor.handle(&get("/manifests/app.json")).await.unwrap());

        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response, first.response);
        assert_eq!(network.calls(), 1, "Warm request should not touch the network");
    }

    #[tokio::test]
    async fn test_repeated_requests_are_stable() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(FakeNetwork::new().route("/manifests/app.json", 200, "body"));
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        let first = served(interceptor.handle(&get("/manifests/app.json")).await.unwrap());
        for _ in 0..5 {
            let again = served(interceptor.handle(&get("/manifests/app.json")).await.unwrap());
            assert_eq!(again.response, first.response);
        }

        assert_eq!(network.calls(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_non_ok_response_is_returned_but_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(FakeNetwork::new().route("/manifests/broken.json", 500, "oops"));
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        let first = served(interceptor.handle(&get("/manifests/broken.json")).await.unwrap());
        assert_eq!(first.response.status, 500);
        assert_eq!(first.source, ResponseSource::Network);
        assert!(store.is_empty().await);

        let missing = served(interceptor.handle(&get("/manifests/missing.json")).await.unwrap());
        assert_eq!(missing.response.status, 404);
        assert!(store.is_empty().await);

        interceptor.handle(&get("/manifests/broken.json")).await.unwrap();
        assert_eq!(network.calls(), 3, "Failures should be retried on the next request");
    }

    #[tokio::test]
    async fn test_network_failure_propagates_and_is_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(FakeNetwork::unreachable());
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        let result = interceptor.handle(&get("/manifests/app.json")).await;
        assert!(matches!(
            result,
            Err(InterceptError::Fetch(FetchError::Unreachable(_)))
        ));

        let _ = interceptor.handle(&get("/manifests/app.json")).await;
        assert_eq!(network.calls(), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_out_of_scope_requests_never_touch_store() {
        let store = Arc::new(RecordingStore::default());
        let network = Arc::new(FakeNetwork::new().route("/other/resource", 200, "x"));
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        let url = Url::parse("https://resolver.local/manifests/app.json").unwrap();
        let requests = [
            get("/other/resource"),
            get("/manifests"),
            ManifestRequest::new(Method::POST, url.clone()),
            ManifestRequest::new(Method::PUT, url.clone()),
            ManifestRequest::new(Method::HEAD, url),
        ];

        for request in &requests {
            let outcome = interceptor.handle(request).await.unwrap();
            assert_eq!(outcome, Interception::PassThrough);
        }

        assert!(store.accesses().is_empty());
        assert_eq!(network.calls(), 0, "Pass-through is the host's job");
    }

    #[tokio::test]
    async fn test_hit_reads_store_once_and_never_writes() {
        let store = Arc::new(RecordingStore::default());
        let network = Arc::new(FakeNetwork::new().route("/manifests/app.json", 200, "x"));
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        interceptor.handle(&get("/manifests/app.json")).await.unwrap();
        interceptor.handle(&get("/manifests/app.json")).await.unwrap();

        assert_eq!(store.accesses(), vec!["get", "put", "get"]);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let network = Arc::new(FakeNetwork::new().route("/manifests/app.json", 200, "x"));
        let interceptor = ManifestInterceptor::new(BrokenStore, Arc::clone(&network));

        let result = interceptor.handle(&get("/manifests/app.json")).await;

        assert!(matches!(
            result,
            Err(InterceptError::Store(StoreError::Unavailable))
        ));
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_leave_single_entry() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(
            FakeNetwork::new()
                .route("/manifests/z.json", 200, "z")
                .rendezvous(2),
        );
        let interceptor = ManifestInterceptor::new(Arc::clone(&store), Arc::clone(&network));

        let request = get("/manifests/z.json");
        let (a, b) = tokio::join!(interceptor.handle(&request), interceptor.handle(&request));
        let a = served(a.unwrap());
        let b = served(b.unwrap());

        assert_ne!(a.response, b.response);
        assert_eq!(network.calls(), 2, "Both misses fetch independently");
        assert_eq!(store.len().await, 1);

        let stored = store.get(&request.key()).await.unwrap().unwrap();
        assert!(
            stored == a.response || stored == b.response,
            "Stored entry should equal one of the fetched responses"
        );
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let store = Arc::new(MemoryStore::new());
        let network = Arc::new(FakeNetwork::new().route("/bundles/a.json", 200, "a"));
        let config = InterceptorConfig {
            path_prefix: "/bundles/".to_string(),
            ..InterceptorConfig::default()
        };
        let interceptor =
            ManifestInterceptor::with_config(Arc::clone(&store), Arc::clone(&network), config);

        assert_eq!(
            interceptor.handle(&get("/manifests/a.json")).await.unwrap(),
            Interception::PassThrough
        );
        served(interceptor.handle(&get("/bundles/a.json")).await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_lifecycle_hooks_skip_waiting_and_claim() {
        let interceptor = ManifestInterceptor::new(MemoryStore::new(), FakeNetwork::new());
        let signals = LifecycleSignals::new();

        interceptor.on_install(&signals).await;
        assert!(signals.skip_waiting_requested());
        assert!(!signals.claim_requested());

        interceptor.on_activate(&signals).await;
        assert!(signals.claim_requested());
    }
}
