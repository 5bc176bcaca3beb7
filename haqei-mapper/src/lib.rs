//! haqei-mapper library
//!
//! Deterministic mapping from free text or questionnaire answers to one of the
//! 384 I Ching line states, with a three-tier fallback chain, a hot/warm/cold
//! result cache and a determinism verification harness.
//!
//! **Pipeline:** input -> [`extractors`] -> [`mapper`] (scored with a
//! [`random::SeededRandomSource`] derived from the seed and cache key) ->
//! [`fallback`] on failure -> [`cache`] -> [`types::MappingResult`]

#![deny(clippy::disallowed_methods, clippy::disallowed_types)]

pub mod api;
pub mod cache;
pub mod config;
pub mod determinism;
pub mod error;
pub mod extractors;
pub mod fallback;
pub mod mapper;
pub mod random;
pub mod reference;
pub mod service;
pub mod stats;
pub mod types;

pub use crate::error::{ApiError, ApiResult, MapperError, Result};
pub use crate::service::MappingService;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: MappingService,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: MappingService) -> Self {
        Self {
            service,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::mapping_routes())
        .merge(api::cache_routes())
        .merge(api::verify_routes())
        .merge(api::stats_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
