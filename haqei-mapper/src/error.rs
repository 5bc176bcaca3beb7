//! Error types for haqei-mapper
//!
//! Library errors are `MapperError`. Per-request failures (`ScoringError`,
//! `ExtractionFailure`, `CacheUnavailable`) are absorbed by the fallback chain
//! and the cache; only configuration errors at startup and determinism
//! violations during verification reach a caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::determinism::DeterminismViolation;
use crate::types::LineId;

/// Result type for mapper operations
pub type Result<T> = std::result::Result<T, MapperError>;

/// Top-level mapper error
#[derive(Debug, Error)]
pub enum MapperError {
    /// Missing seed, malformed reference data or invalid tuning values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Scoring invariant violated
    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    /// Feature extraction failed
    #[error("Extraction failure: {0}")]
    Extraction(#[from] ExtractionFailure),

    /// Warm or cold cache tier unreachable or over budget
    #[error("Cache unavailable ({tier} tier): {reason}")]
    CacheUnavailable { tier: &'static str, reason: String },

    /// Verification found differing outputs
    #[error("Determinism violation: {0}")]
    DeterminismViolation(#[from] DeterminismViolation),
}

/// Internal invariant violations inside the scoring engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("reference table is empty")]
    EmptyReferenceTable,

    #[error("non-finite score for line {0}")]
    NonFiniteScore(LineId),

    #[error("no reference keyword matched the input")]
    NoKeywordMatch,
}

/// Feature extraction failures; always recoverable by degrading
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionFailure {
    #[error("input of {len} characters exceeds the {max} character limit")]
    InputTooLong { len: usize, max: usize },

    #[error("no answers to aggregate")]
    EmptyAnswers,

    #[error("extractor unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// HTTP errors
// ============================================================================

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Mapper error; status depends on the kind
    #[error(transparent)]
    Mapper(#[from] MapperError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Mapper(ref err) => match err {
                MapperError::Configuration(_) => {
                    (StatusCode::BAD_REQUEST, "CONFIGURATION_ERROR", err.to_string())
                }
                MapperError::DeterminismViolation(_) => {
                    (StatusCode::CONFLICT, "DETERMINISM_VIOLATION", err.to_string())
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "MAPPER_ERROR", err.to_string()),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
