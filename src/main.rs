mod chain;
mod config;
mod error;
mod gateway;
mod policy;
mod rate_limit;
mod registry;
mod response;
mod routes;
mod scrape;
mod store;

use axum::http::Method;
use chain::RpcChainSource;
use config::Config;
use gateway::Gateway;
use rate_limit::RateLimiter;
use routes::AppState;
use scrape::RankingScraper;
use std::sync::Arc;
use store::{MemoryStore, RedisStore, Store};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "metrics_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting metrics gateway");

    let config = Config::from_env();
    tracing::info!("  - RPC endpoint: {}", config.rpc_url);
    tracing::info!("  - ranking page: {}", config.ranking_url);

    let store: Arc<dyn Store> = match &config.redis_url {
        Some(url) => match RedisStore::connect(url).await {
            Ok(redis_store) => {
                tracing::info!("  - store: redis at {}", url);
                Arc::new(redis_store)
            }
            Err(error) => {
                tracing::error!("Error connecting to redis: {}", error);
                tracing::warn!("  - store: falling back to in-process memory");
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            tracing::info!("  - store: in-process memory");
            Arc::new(MemoryStore::new())
        }
    };

    let limiter = RateLimiter::new();
    limiter.start_cleanup_task();

    let chain = RpcChainSource::new(config.rpc_url.clone(), Arc::clone(&store))
        .expect("Failed to create RPC client");
    let ranks =
        RankingScraper::new(config.ranking_url.clone()).expect("Failed to create scrape client");

    let state = AppState {
        gateway: Arc::new(Gateway::new(Arc::clone(&store), limiter)),
        chain: Arc::new(chain),
        ranks: Arc::new(ranks),
    };

    // GET-only surface with a permissive origin.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);

    let app = routes::router(state)
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");

    tracing::info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed to start");
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", error);
    }
    tracing::info!("Shutting down");
}

/// Last-resort fault handler: log the detail server-side, answer with the
/// generic envelope.
fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());

    tracing::error!("Request handler panicked: {}", detail);
    response::bad_request()
}
