//! Facial emotion endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use handmat_core::Availability;
use serde::Serialize;

use super::recognize::{image_from_json, run, ImageRequest, RecognitionResponse};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ExpressionsResponse {
    pub success: bool,
    pub expressions: Vec<String>,
    pub backend: String,
    pub availability: Availability,
}

/// POST /api/face/analyze
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<Json<RecognitionResponse>> {
    let image = image_from_json(&state, payload)?;
    Ok(Json(run(&state.face, image).await))
}

/// GET /api/face/expressions
pub async fn expressions(State(state): State<AppState>) -> Json<ExpressionsResponse> {
    let descriptor = state.face.descriptor();
    Json(ExpressionsResponse {
        success: true,
        expressions: descriptor.labels.clone(),
        backend: descriptor.name.clone(),
        availability: state.face.availability(),
    })
}

/// Build face routes
pub fn face_routes() -> Router<AppState> {
    Router::new()
        .route("/api/face/analyze", post(analyze))
        .route("/api/face/expressions", get(expressions))
}
