//! HTTP API.
//!
//! Exposes the aggregator over HTTP with axum:
//! - `GET /api/campaigns?platform=<id>&status=<all>`
//! - `GET /api/platforms`
//! - `GET /api/health`
//!
//! Preflight `OPTIONS` requests are answered by the CORS middleware.

mod cors;
mod error;

pub use cors::CorsPolicy;
pub use error::ApiError;

use anyhow::{Context, Result};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::CACHE_CONTROL;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};

use crate::aggregator::Aggregator;
use crate::config::ServerConfig;
use crate::models::StatusFilter;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
    cors: Arc<CorsPolicy>,
    cache_max_age: u64,
}

impl AppState {
    pub fn new(aggregator: Aggregator, server: &ServerConfig) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            cors: Arc::new(CorsPolicy::new(server.allowed_origins.clone())),
            cache_max_age: server.cache_max_age,
        }
    }
}

/// Query string of the aggregation endpoint.
#[derive(Debug, Deserialize)]
pub struct CampaignQuery {
    pub platform: Option<String>,
    pub status: Option<String>,
}

async fn api_campaigns(
    State(state): State<AppState>,
    query: Result<Query<CampaignQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let platform = query
        .platform
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing required query parameter: platform"))?;
    let filter = StatusFilter::from_query(query.status.as_deref());

    let result = state.aggregator.aggregate(&platform, filter).await?;

    let cache_control = format!("private, max-age={}", state.cache_max_age);
    Ok(([(CACHE_CONTROL, cache_control)], Json(result)).into_response())
}

async fn api_platforms(State(state): State<AppState>) -> impl IntoResponse {
    let platforms: Vec<_> = state
        .aggregator
        .configured_platforms()
        .into_iter()
        .map(|(platform, accounts)| json!({"platform": platform, "accounts": accounts}))
        .collect();
    Json(platforms)
}

async fn api_health(State(state): State<AppState>) -> impl IntoResponse {
    let platforms: Vec<_> = state
        .aggregator
        .configured_platforms()
        .into_iter()
        .map(|(platform, _)| platform)
        .collect();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "platforms": platforms,
    }))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/campaigns", get(api_campaigns))
        .route("/api/platforms", get(api_platforms))
        .route("/api/health", get(api_health))
        .layer(middleware::from_fn_with_state(state.clone(), cors::cors))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn serve(aggregator: Aggregator, server: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", server.bind))?;
    let app = router(AppState::new(aggregator, server));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
