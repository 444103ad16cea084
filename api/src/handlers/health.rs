//! Health handlers
//!
//! Liveness and build information. Reaching these at all means the startup
//! sequence got past migration.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET / and GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub uptime_secs: i64,
}

/// GET /version
pub async fn version(State(state): State<AppState>) -> Json<VersionResponse> {
    let uptime = chrono::Utc::now() - state.started_at;

    Json(VersionResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        os: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        uptime_secs: uptime.num_seconds().max(0),
    })
}
