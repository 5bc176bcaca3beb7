//! Cache invalidation endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::types::text_cache_key;
use crate::{ApiError, ApiResult, AppState};

/// Either an explicit cache key or the text whose key should be dropped
#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub invalidated: String,
}

/// POST /cache/invalidate
///
/// `key` wins when both are given. 400 when neither is.
pub async fn invalidate(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> ApiResult<Json<InvalidateResponse>> {
    let key = match (request.key, request.text) {
        (Some(key), _) => key,
        (None, Some(text)) => text_cache_key(&text),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "either \"key\" or \"text\" is required".to_string(),
            ))
        }
    };

    state.service.invalidate(&key).await;
    Ok(Json(InvalidateResponse { invalidated: key }))
}

pub fn cache_routes() -> Router<AppState> {
    Router::new().route("/cache/invalidate", post(invalidate))
}
