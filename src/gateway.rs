//! The cache-and-rate-limit pipeline every route runs through: rate check,
//! cache read (fail-open), compute on miss, best-effort TTL write, envelope.

use crate::error::GatewayError;
use crate::policy::TokenClass;
use crate::rate_limit::{Decision, RateLimiter};
use crate::response;
use crate::store::Store;
use axum::response::Response;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One gateway request, as data: where it caches, what the result field is
/// called, and which policy class applies.
pub struct Query {
    /// Normalized request path; doubles as the cache key.
    pub path: String,
    /// Forwarded client address, combined with the path for rate limiting.
    pub caller: String,
    pub result_key: &'static str,
    pub class: TokenClass,
}

pub struct Gateway {
    store: Arc<dyn Store>,
    limiter: RateLimiter,
    // Per-key gate coalescing concurrent misses into one computation.
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl Gateway {
    pub fn new(store: Arc<dyn Store>, limiter: RateLimiter) -> Self {
        Self {
            store,
            limiter,
            in_flight: DashMap::new(),
        }
    }

    /// Serve `query` from cache, or compute it via `compute` and cache the
    /// result under the class TTL. Adapter failures become envelope errors
    /// and are never cached.
    pub async fn respond<F, Fut>(&self, query: Query, compute: F) -> Response
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String, GatewayError>> + Send,
    {
        let identity = format!("{}|{}", query.path, query.caller);
        let decision = self.limiter.check(
            &identity,
            query.class.limit_window_secs(),
            query.class.quota(),
        );
        if let Decision::Reject { retry_after_secs } = decision {
            tracing::info!(%identity, "rate limited");
            return response::rate_limited(retry_after_secs);
        }

        let Some(ttl) = query.class.cache_secs() else {
            return response::not_supported();
        };

        if let Some(value) = self.cache_read(&query.path).await {
            tracing::debug!(key = %query.path, "cache hit");
            return response::success(query.result_key, &value, ttl);
        }

        let gate = self
            .in_flight
            .entry(query.path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _leader = gate.lock().await;

        // A concurrent request may have filled the cache while we waited.
        if let Some(value) = self.cache_read(&query.path).await {
            self.in_flight.remove(&query.path);
            return response::success(query.result_key, &value, ttl);
        }

        let result = compute().await;
        self.in_flight.remove(&query.path);

        match result {
            Ok(value) => {
                // Write is best-effort; the response never depends on it.
                if let Err(error) = self.store.set_with_ttl(&query.path, &value, ttl).await {
                    tracing::warn!(%error, key = %query.path, "cache write failed");
                }
                response::success(query.result_key, &value, ttl)
            }
            Err(GatewayError::UnsupportedToken) => response::not_supported(),
            Err(error) => {
                tracing::error!(%error, key = %query.path, "compute failed");
                response::bad_request()
            }
        }
    }

    /// Fail-open read: a store error is logged and treated as a miss so the
    /// pipeline proceeds to compute fresh.
    async fn cache_read(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(hit) => hit,
            Err(error) => {
                tracing::warn!(%error, key, "cache read failed, computing fresh");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct DownStore;

    #[async_trait]
    impl Store for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(connection_refused())
        }

        async fn set_with_ttl(&self, _: &str, _: &str, _: u64) -> Result<(), StoreError> {
            Err(connection_refused())
        }

        async fn set_forever(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(connection_refused())
        }
    }

    fn connection_refused() -> StoreError {
        StoreError::Redis(redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "store down",
        )))
    }

    fn query(class: TokenClass) -> Query {
        Query {
            path: "/api/bancor/eth".to_string(),
            caller: "1.2.3.4".to_string(),
            result_key: "space",
            class,
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn cached_value_skips_the_compute_step() {
        let store = Arc::new(MemoryStore::new());
        store.set_with_ttl("/api/bancor/eth", "9.99", 10).await.unwrap();
        let gateway = Gateway::new(store, RateLimiter::new());
        let calls = AtomicUsize::new(0);

        let response = gateway
            .respond(query(TokenClass::Fast), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("1.0".to_string())
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["space"], "9.99");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn miss_computes_and_writes_with_class_ttl() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Gateway::new(Arc::clone(&store) as Arc<dyn Store>, RateLimiter::new());

        let response = gateway
            .respond(query(TokenClass::Fast), || async { Ok("123.46".to_string()) })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "200");
        assert_eq!(body["space"], "123.46");
        assert!(body["message"].as_str().unwrap().contains("10 seconds"));

        assert_eq!(
            store.get("/api/bancor/eth").await.unwrap(),
            Some("123.46".to_string())
        );
        let ttl = store.ttl_of("/api/bancor/eth").unwrap();
        assert!(ttl <= Duration::from_secs(10) && ttl > Duration::from_secs(8));
    }

    #[tokio::test]
    async fn unsupported_class_never_computes_or_writes() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Gateway::new(Arc::clone(&store) as Arc<dyn Store>, RateLimiter::new());
        let calls = AtomicUsize::new(0);

        let response = gateway
            .respond(query(TokenClass::Unsupported), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("1.0".to_string())
            })
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Token not supported");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get("/api/bancor/eth").await.unwrap(), None);
    }

    #[tokio::test]
    async fn compute_failure_returns_400_and_is_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Gateway::new(Arc::clone(&store) as Arc<dyn Store>, RateLimiter::new());

        let response = gateway
            .respond(query(TokenClass::Fast), || async {
                Err(GatewayError::Upstream("node timed out".to_string()))
            })
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["status"], "400");
        assert_eq!(store.get("/api/bancor/eth").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unsupported_adapter_error_maps_to_404() {
        let gateway = Gateway::new(Arc::new(MemoryStore::new()), RateLimiter::new());

        let response = gateway
            .respond(query(TokenClass::Fast), || async {
                Err(GatewayError::UnsupportedToken)
            })
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn store_outage_fails_open_to_the_compute_path() {
        let gateway = Gateway::new(Arc::new(DownStore), RateLimiter::new());
        let calls = AtomicUsize::new(0);

        let response = gateway
            .respond(query(TokenClass::Fast), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("42".to_string())
            })
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["space"], "42");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn third_request_in_window_is_rejected() {
        let gateway = Gateway::new(Arc::new(MemoryStore::new()), RateLimiter::new());

        for _ in 0..2 {
            let response = gateway
                .respond(query(TokenClass::Fast), || async { Ok("1".to_string()) })
                .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = gateway
            .respond(query(TokenClass::Fast), || async { Ok("1".to_string()) })
            .await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let message = body_json(response).await["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("once per 10 seconds"));
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_computation() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&store) as Arc<dyn Store>,
            RateLimiter::new(),
        ));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let gateway = Arc::clone(&gateway);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                gateway
                    .respond(query(TokenClass::Fast), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("7".to_string())
                    })
                    .await
                    .status()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), StatusCode::OK);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
