//! Sentence composition endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use handmat_core::{BackendDescriptor, CompositionSource, Signals};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HandSignal {
    pub prediction: Option<String>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FaceSignal {
    pub emotion: Option<String>,
    pub confidence: Option<f32>,
}

/// Body of `POST /api/compose`. Either signal may be omitted, not both.
#[derive(Debug, Default, Deserialize)]
pub struct ComposeRequest {
    pub hand_result: Option<HandSignal>,
    pub face_result: Option<FaceSignal>,
}

#[derive(Debug, Serialize)]
pub struct Components {
    pub hand: String,
    pub emotion: String,
}

#[derive(Debug, Serialize)]
pub struct ComposeResponse {
    pub success: bool,
    pub sentence: String,
    pub confidence: f32,
    pub source: CompositionSource,
    pub components: Components,
    pub generator: BackendDescriptor,
}

fn check_confidence(field: &str, value: Option<f32>) -> ApiResult<Option<f32>> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(ApiError::Validation(format!(
            "{field} must be a fraction in [0, 1], got {v}"
        ))),
        other => Ok(other),
    }
}

fn non_blank(label: Option<String>) -> Option<String> {
    label.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ComposeRequest {
    fn into_signals(self) -> ApiResult<Signals> {
        if self.hand_result.is_none() && self.face_result.is_none() {
            return Err(ApiError::Validation(
                "at least one of hand_result or face_result is required".into(),
            ));
        }
        let hand = self.hand_result.unwrap_or_default();
        let face = self.face_result.unwrap_or_default();

        Ok(Signals {
            gesture: non_blank(hand.prediction),
            gesture_confidence: check_confidence("hand_result.confidence", hand.confidence)?,
            emotion: non_blank(face.emotion),
            emotion_confidence: check_confidence("face_result.confidence", face.confidence)?,
        })
    }
}

/// POST /api/compose
pub async fn compose(
    State(state): State<AppState>,
    payload: Result<Json<ComposeRequest>, JsonRejection>,
) -> ApiResult<Json<ComposeResponse>> {
    let Json(request) = payload?;
    let signals = request.into_signals()?;

    let result = state.composer.compose(&signals).await;
    tracing::info!(source = ?result.source, confidence = result.confidence, "sentence composed");

    Ok(Json(ComposeResponse {
        success: true,
        sentence: result.sentence,
        confidence: result.confidence,
        source: result.source,
        components: Components {
            hand: signals.gesture.unwrap_or_else(|| "unknown".into()),
            emotion: signals.emotion.unwrap_or_else(|| "neutral".into()),
        },
        generator: state.composer.descriptor(),
    }))
}

/// Build composition routes
pub fn compose_routes() -> Router<AppState> {
    Router::new().route("/api/compose", post(compose))
}
