//! HTTP API handlers for haqei-mapper

pub mod cache;
pub mod health;
pub mod mapping;
pub mod stats;
pub mod verify;

pub use cache::cache_routes;
pub use health::health_routes;
pub use mapping::mapping_routes;
pub use stats::stats_routes;
pub use verify::verify_routes;
