//! handmatd library interface: application state and router.
//!
//! `main` builds [`AppState`] once at startup; the integration tests build
//! their own with fixed backends and drive [`build_router`] directly.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod service;

pub use crate::error::{ApiError, ApiResult};

use crate::config::Config;
use crate::engine::EngineError;
use crate::service::RecognitionService;
use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method, Request};
use axum::Router;
use chrono::{DateTime, Utc};
use handmat_core::{
    select_classifier, CapabilityClass, Composer, FallbackPolicy, GeneratorConfig, MockFaceModel,
    MockHandModel, OpenAiGenerator, Recognizer,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hand: RecognitionService,
    pub face: RecognitionService,
    pub composer: Arc<Composer>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        hand: RecognitionService,
        face: RecognitionService,
        composer: Composer,
    ) -> Self {
        Self {
            config: Arc::new(config),
            hand,
            face,
            composer: Arc::new(composer),
            startup_time: Utc::now(),
        }
    }

    /// Probe every capability once and start the engines.
    ///
    /// Blocks while real models load; call before serving.
    pub fn from_config(config: Config) -> Result<Self, EngineError> {
        let policy = if config.mock_fallback {
            FallbackPolicy::Mock
        } else {
            FallbackPolicy::Disabled
        };

        let hand_spec =
            handmat_core::classifier_spec(&config.model_dir, CapabilityClass::Hand, config.hand_threshold);
        let hand = select_classifier(&hand_spec, policy, || {
            Box::new(MockHandModel::new()) as Box<dyn Recognizer>
        });

        let face_spec =
            handmat_core::classifier_spec(&config.model_dir, CapabilityClass::Face, config.face_threshold);
        let face = select_classifier(&face_spec, policy, || {
            Box::new(MockFaceModel::new()) as Box<dyn Recognizer>
        });

        let composer = build_composer(&config);

        let hand = RecognitionService::start(hand, config.response_floor)?;
        let face = RecognitionService::start(face, config.response_floor)?;
        Ok(Self::new(config, hand, face, composer))
    }
}

fn build_composer(config: &Config) -> Composer {
    let Some(api_key) = config.llm_api_key.clone() else {
        tracing::info!("no generative backend configured; composing from templates");
        return Composer::template_only();
    };

    let generator = OpenAiGenerator::new(GeneratorConfig {
        endpoint: config.llm_endpoint.clone(),
        model: config.llm_model.clone(),
        api_key,
        timeout_secs: config.llm_timeout_secs,
    });
    match generator {
        Ok(g) => {
            tracing::info!(model = %config.llm_model, endpoint = %config.llm_endpoint, "generative backend configured");
            Composer::with_generator(Arc::new(g))
        }
        Err(e) => {
            tracing::warn!(error = %e, "generative backend unavailable; composing from templates");
            Composer::template_only()
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // Base64 inflates payloads by a third; leave room for the JSON envelope
    // so oversized images reach the handler and get a structured 413.
    let body_limit = state.config.max_upload_bytes().saturating_mul(2);
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .merge(api::health_routes())
        .merge(api::recognize_routes())
        .merge(api::face_routes())
        .merge(api::compose_routes())
        .merge(api::model_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
        .with_state(state)
}
