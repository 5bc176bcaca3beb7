//! Selection statistics endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::stats::StatsSnapshot;
use crate::AppState;

/// GET /stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.service.stats())
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_stats))
}
