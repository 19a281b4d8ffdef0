//! Model descriptor endpoint

use axum::{extract::State, routing::get, Json, Router};
use handmat_core::{Availability, BackendDescriptor};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    #[serde(flatten)]
    pub descriptor: BackendDescriptor,
    pub availability: Availability,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub success: bool,
    pub hand: ModelInfo,
    pub face: ModelInfo,
    pub language: ModelInfo,
}

/// GET /api/models/info
///
/// Snapshot taken at startup; it does not change while the process runs.
pub async fn models_info(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        success: true,
        hand: ModelInfo {
            descriptor: state.hand.descriptor().clone(),
            availability: state.hand.availability(),
        },
        face: ModelInfo {
            descriptor: state.face.descriptor().clone(),
            availability: state.face.availability(),
        },
        language: ModelInfo {
            descriptor: state.composer.descriptor(),
            availability: state.composer.availability(),
        },
    })
}

/// Build model info routes
pub fn model_routes() -> Router<AppState> {
    Router::new().route("/api/models/info", get(models_info))
}
