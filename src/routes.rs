//! The HTTP surface: five GET routes, each a thin wrapper that resolves the
//! policy class and hands a compute future to the gateway engine.

use crate::chain::ChainSource;
use crate::gateway::{Gateway, Query};
use crate::policy;
use crate::scrape::RankSource;
use axum::Router;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub chain: Arc<dyn ChainSource>,
    pub ranks: Arc<dyn RankSource>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/bancor/{token}", get(bancor_space))
        .route("/api/bancor/vortex/rate/{token}", get(vortex_rate))
        .route("/api/bancor/vortex/burn/vbnt", get(vortex_burn))
        .route("/api/totalsupply/vbnt", get(total_supply))
        .route("/api/defipulse/{category}/rank/{project}", get(defipulse_rank))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Rate-limit identity policy: the resource path leads, the forwarded client
/// address follows. Combining both means one client cannot reset its budget
/// by rotating paths, and one hot path cannot exhaust everyone's budget.
/// Only `x-forwarded-for` identifies the client; the gateway is expected to
/// sit behind a proxy, and direct callers collapse into one local identity.
fn caller_address(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "local".to_string())
}

fn query(
    uri: &OriginalUri,
    headers: &HeaderMap,
    class: policy::TokenClass,
    result_key: &'static str,
) -> Query {
    Query {
        path: uri.0.path().to_string(),
        caller: caller_address(headers),
        result_key,
        class,
    }
}

async fn bancor_space(
    State(state): State<AppState>,
    Path(token): Path<String>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let q = query(&uri, &headers, policy::resolve_class(&token), "space");
    let chain = Arc::clone(&state.chain);
    state
        .gateway
        .respond(q, move || async move { chain.pool_available_space(&token).await })
        .await
}

async fn vortex_rate(
    State(state): State<AppState>,
    Path(token): Path<String>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let q = query(&uri, &headers, policy::resolve_class(&token), "rate");
    let chain = Arc::clone(&state.chain);
    state
        .gateway
        .respond(q, move || async move { chain.vortex_rate(&token).await })
        .await
}

async fn vortex_burn(
    State(state): State<AppState>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let q = query(&uri, &headers, policy::resolve_class("vbnt"), "burned");
    let chain = Arc::clone(&state.chain);
    state
        .gateway
        .respond(q, move || async move { chain.vortex_burned().await })
        .await
}

async fn total_supply(
    State(state): State<AppState>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let q = query(&uri, &headers, policy::resolve_class("vbnt"), "totalSupply");
    let chain = Arc::clone(&state.chain);
    state
        .gateway
        .respond(q, move || async move { chain.total_supply("vbnt").await })
        .await
}

async fn defipulse_rank(
    State(state): State<AppState>,
    Path((category, project)): Path<(String, String)>,
    uri: OriginalUri,
    headers: HeaderMap,
) -> Response {
    let q = query(&uri, &headers, policy::ranking_class(), "rank");
    let ranks = Arc::clone(&state.ranks);
    state
        .gateway
        .respond(q, move || async move {
            let rank = ranks
                .rank(&category.to_lowercase(), &project.to_lowercase())
                .await?;
            Ok(rank.to_string())
        })
        .await
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
