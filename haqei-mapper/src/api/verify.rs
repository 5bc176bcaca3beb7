//! Determinism verification endpoint
//!
//! `POST /verify {"inputs": ["...", "..."], "repetitions": 3}` runs the
//! determinism check over text inputs. A violation is a 409 with the
//! `DETERMINISM_VIOLATION` error code.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::determinism::DeterminismReport;
use crate::types::MappingInput;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub inputs: Vec<String>,
    #[serde(default)]
    pub repetitions: Option<usize>,
}

/// POST /verify
pub async fn verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<DeterminismReport>> {
    if request.inputs.is_empty() {
        return Err(ApiError::BadRequest("inputs must not be empty".to_string()));
    }

    let inputs: Vec<MappingInput> = request.inputs.into_iter().map(MappingInput::Text).collect();
    let report = state
        .service
        .verify_determinism(&inputs, request.repetitions)
        .await?;
    Ok(Json(report))
}

pub fn verify_routes() -> Router<AppState> {
    Router::new().route("/verify", post(verify))
}
