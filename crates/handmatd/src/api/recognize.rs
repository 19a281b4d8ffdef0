//! Hand gesture recognition endpoints

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use handmat_core::RecognitionOutcome;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::input;
use crate::service::RecognitionService;
use crate::AppState;

/// JSON body for image endpoints: base64, optionally as a data URL.
#[derive(Debug, Deserialize)]
pub struct ImageRequest {
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Serialize)]
pub struct RecognitionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: RecognitionOutcome,
    pub image: ImageInfo,
}

/// Decode the JSON body into an RGB image, enforcing the upload limit.
pub(crate) fn image_from_json(
    state: &AppState,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<RgbImage> {
    let Json(request) = payload?;
    let encoded = request
        .image
        .ok_or_else(|| ApiError::Validation("missing 'image' field".into()))?;
    let bytes = input::decode_base64(&encoded, state.config.max_upload_bytes())?;
    Ok(input::decode_image(&bytes)?)
}

pub(crate) async fn run(service: &RecognitionService, image: RgbImage) -> RecognitionResponse {
    let info = ImageInfo {
        width: image.width(),
        height: image.height(),
    };
    let outcome = service.recognize(image).await;
    tracing::info!(
        capability = %service.capability(),
        label = %outcome.label,
        confidence = outcome.confidence,
        status = ?outcome.status,
        "recognition complete"
    );
    RecognitionResponse {
        success: true,
        outcome,
        image: info,
    }
}

/// POST /api/recognize
pub async fn recognize(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> ApiResult<Json<RecognitionResponse>> {
    let image = image_from_json(&state, payload)?;
    Ok(Json(run(&state.hand, image).await))
}

/// POST /api/recognize/upload
///
/// Multipart form with the image in field `file`.
pub async fn recognize_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<RecognitionResponse>> {
    let limit = state.config.max_upload_bytes();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from)?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(ApiError::Validation("no file selected".into()));
        }
        input::check_extension(&filename)?;

        let bytes = field
            .bytes()
            .await
            .map_err(ApiError::from)?;
        input::check_size(bytes.len(), limit)?;
        let image = input::decode_image(&bytes)?;

        tracing::debug!(%filename, size = bytes.len(), "upload received");
        return Ok(Json(run(&state.hand, image).await));
    }

    Err(ApiError::Validation("missing 'file' field".into()))
}

/// Build recognition routes
pub fn recognize_routes() -> Router<AppState> {
    Router::new()
        .route("/api/recognize", post(recognize))
        .route("/api/recognize/upload", post(recognize_upload))
}
