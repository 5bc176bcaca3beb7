//! Health check endpoint
//!
//! Reports `"degraded"` while a warm or cold cache failure or budget overrun
//! is more recent than `[cache] degraded_window_secs`; mapping itself keeps
//! working from the hot tier.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Line states in the loaded reference table
    pub line_states: usize,
    /// Warm/cold operations absorbed as misses since startup
    pub cache_degradations: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds()
        .max(0) as u64;
    let cache_degradations = state.service.cache_stats().degradations;

    let status = if state.service.cache_degraded() { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "haqei-mapper".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        line_states: state.service.table().len(),
        cache_degradations,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
