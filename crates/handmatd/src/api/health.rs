//! Service index and health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use handmat_core::Availability;
use serde::Serialize;

use crate::service::RecognitionService;
use crate::AppState;

const SERVICE_NAME: &str = "handmatd";

const ENDPOINTS: [&str; 9] = [
    "GET /",
    "GET /health",
    "GET /health/detailed",
    "POST /api/recognize",
    "POST /api/recognize/upload",
    "POST /api/face/analyze",
    "GET /api/face/expressions",
    "POST /api/compose",
    "GET /api/models/info",
];

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    /// RFC 3339 timestamp of this check
    pub timestamp: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct CapabilityHealth {
    pub availability: Availability,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CapabilitiesHealth {
    pub hand: CapabilityHealth,
    pub face: CapabilityHealth,
    pub language: CapabilityHealth,
}

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub max_upload_mb: u64,
    pub response_floor: f32,
    pub hand_threshold: f32,
    pub face_threshold: f32,
    pub mock_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    #[serde(flatten)]
    pub health: HealthResponse,
    pub capabilities: CapabilitiesHealth,
    pub config: ConfigSummary,
}

fn uptime_seconds(state: &AppState) -> u64 {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    uptime.num_seconds().max(0) as u64
}

fn basic_health(state: &AppState, status: &'static str) -> HealthResponse {
    HealthResponse {
        status,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: uptime_seconds(state),
    }
}

fn capability_health(service: &RecognitionService) -> CapabilityHealth {
    CapabilityHealth {
        availability: service.availability(),
        backend: service.descriptor().name.clone(),
        reason: service.fault().map(String::from),
    }
}

/// GET /
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        name: "HandMat API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS.to_vec(),
    })
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(basic_health(&state, "healthy"))
}

/// GET /health/detailed
///
/// Degraded when a recognition capability has no backend at all.
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let serving = state.hand.availability().is_serving() && state.face.availability().is_serving();
    let status = if serving { "healthy" } else { "degraded" };

    let language = CapabilityHealth {
        availability: state.composer.availability(),
        backend: state.composer.descriptor().name,
        reason: None,
    };

    Json(DetailedHealthResponse {
        health: basic_health(&state, status),
        capabilities: CapabilitiesHealth {
            hand: capability_health(&state.hand),
            face: capability_health(&state.face),
            language,
        },
        config: ConfigSummary {
            max_upload_mb: state.config.max_upload_mb,
            response_floor: state.config.response_floor,
            hand_threshold: state.config.hand_threshold,
            face_threshold: state.config.face_threshold,
            mock_fallback: state.config.mock_fallback,
        },
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/health/detailed", get(health_detailed))
}
