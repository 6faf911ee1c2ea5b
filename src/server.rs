//! HTTP server for the burn ban API
//!
//! Provides /health, /api/burn-bans and /api/burn-bans/{county}. Burn ban
//! responses carry an `X-Cache: HIT|MISS` header telling whether the data came
//! from the on-disk cache.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::Memoized;
use crate::data::{find_county, BurnBan, BurnBanClient, BurnBanError};
use crate::error::ApiError;

/// Cache key of the burn ban data
pub const BURN_BANS_CACHE_KEY: &str = "burn-bans";

const X_CACHE: &str = "x-cache";

/// Result of one upstream burn ban fetch
pub type BurnBanResult = Result<Vec<BurnBan>, BurnBanError>;

/// Type-erased burn ban producer, so tests can stand in for the live client
pub type BurnBanProducer = Box<dyn Fn(()) -> BoxFuture<'static, BurnBanResult> + Send + Sync>;

/// Memoized burn ban source shared by all handlers
pub type BurnBanSource = Memoized<Vec<BurnBan>, BurnBanProducer>;

/// Shared state for the HTTP server
pub struct ServerState {
    pub burn_bans: BurnBanSource,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(burn_bans: BurnBanSource) -> Self {
        Self {
            burn_bans,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache_key: String,
}

/// Wraps a live client as a producer for [`Memoized`]
pub fn client_producer(client: BurnBanClient) -> BurnBanProducer {
    let client = Arc::new(client);
    Box::new(move |()| {
        let client = Arc::clone(&client);
        async move { client.fetch_burn_bans().await }.boxed()
    })
}

/// Builds a JSON response tagged with the cache header
pub(crate) fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
    from_cache: bool,
) -> Response {
    let mut response = (status, Json(body)).into_response();
    let cache_status = if from_cache { "HIT" } else { "MISS" };
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(cache_status));
    response
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/burn-bans", get(list_burn_bans))
        .route("/api/burn-bans/", get(missing_county))
        .route("/api/burn-bans/{county}", get(county_burn_ban))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server, stopping on Ctrl-C
pub async fn start_server(state: SharedState, addr: SocketAddr) -> std::io::Result<()> {
    let router = create_router(state);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache_key: state.burn_bans.cache().cache_key().to_string(),
    })
}

/// All burn ban records
async fn list_burn_bans(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let lookup = state.burn_bans.lookup(()).await?;
    Ok(json_response(StatusCode::OK, &lookup.value, lookup.from_cache))
}

/// The record for one county, matched case-insensitively
///
/// The segment is compared as decoded, so surrounding whitespace is part of
/// the name and never matches.
async fn county_burn_ban(
    State(state): State<SharedState>,
    Path(county): Path<String>,
) -> Result<Response, ApiError> {
    let lookup = state.burn_bans.lookup(()).await?;

    let burn_ban = find_county(&lookup.value, &county)
        .ok_or(ApiError::NotFound("No burn ban data found for that county"))?;

    Ok(json_response(StatusCode::OK, burn_ban, lookup.from_cache))
}

async fn missing_county() -> ApiError {
    ApiError::BadRequest("A county must be provided")
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found")
}
