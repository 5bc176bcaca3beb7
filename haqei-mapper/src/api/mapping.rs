//! Mapping endpoints
//!
//! **Requests:**
//! - `POST /map/text` `{"text": "...", "top": 5}`
//! - `POST /map/answers` `{"answers": [{"question_id": "q1", "value": "..."}], "top": 5}`
//!
//! `top` is optional; when present the response also lists the best full-tier
//! candidates (at most [`MAX_TOP`]) for diagnostics.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fallback::RankedCandidate;
use crate::types::{Answer, MappingInput, MappingResult};
use crate::{ApiError, ApiResult, AppState};

/// Upper bound for `top`
pub const MAX_TOP: usize = 20;

#[derive(Debug, Deserialize)]
pub struct MapTextRequest {
    pub text: String,
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MapAnswersRequest {
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MappingResponse {
    /// `"hexagram-position"`
    pub line: String,
    #[serde(flatten)]
    pub result: MappingResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<RankedCandidate>>,
}

/// POST /map/text
pub async fn map_text(
    State(state): State<AppState>,
    Json(request): Json<MapTextRequest>,
) -> ApiResult<Json<MappingResponse>> {
    respond(&state, MappingInput::Text(request.text), request.top).await
}

/// POST /map/answers
pub async fn map_answers(
    State(state): State<AppState>,
    Json(request): Json<MapAnswersRequest>,
) -> ApiResult<Json<MappingResponse>> {
    respond(&state, MappingInput::Answers(request.answers), request.top).await
}

async fn respond(
    state: &AppState,
    input: MappingInput,
    top: Option<usize>,
) -> ApiResult<Json<MappingResponse>> {
    let candidates = match top {
        Some(0) | None => None,
        Some(n) if n > MAX_TOP => {
            return Err(ApiError::BadRequest(format!(
                "top must be at most {}, got {}",
                MAX_TOP, n
            )));
        }
        Some(n) => match state.service.rank(&input, n).await {
            Ok(ranked) => Some(ranked),
            Err(e) => {
                // Ranking needs the full tier; the mapping itself still degrades
                debug!(error = %e, "Candidate ranking unavailable");
                None
            }
        },
    };

    let result = state.service.map(input).await;
    Ok(Json(MappingResponse {
        line: result.line_id().to_string(),
        result,
        candidates,
    }))
}

/// Build mapping routes
pub fn mapping_routes() -> Router<AppState> {
    Router::new()
        .route("/map/text", post(map_text))
        .route("/map/answers", post(map_answers))
}
