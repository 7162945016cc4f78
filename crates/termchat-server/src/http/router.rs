//! Axum router for the health endpoints.
//!
//! Middleware: tracing.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use chrono::Utc;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Build the router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub version: &'static str,
    pub uptime_secs: i64,
    pub relay_channels: usize,
}

pub async fn ping() -> ApiResponse<&'static str> {
    ApiResponse::ok("pong")
}

pub async fn health(State(state): State<AppState>) -> ApiResponse<Health> {
    ApiResponse::ok(Health {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        relay_channels: state.chat.bus().channel_count(),
    })
}

async fn not_found() -> ApiResponse<()> {
    ApiResponse::error(StatusCode::NOT_FOUND, "not found")
}
