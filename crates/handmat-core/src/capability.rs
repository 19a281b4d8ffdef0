//! Capability traits every backend implements.
//!
//! Recognition backends (hand, face) and sentence generators (language) share
//! the `identity` / `is_ready` pair; only the work method differs.

use crate::types::{BackendDescriptor, PredictionSet};
use async_trait::async_trait;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend not loaded")]
    NotLoaded,
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// An image classifier for one capability class.
///
/// Implementations are owned by a single worker thread, so the work methods
/// take `&mut self`; the handle never needs to be reentrant.
pub trait Recognizer: Send {
    /// Classify the image, surfacing internal faults.
    fn try_predict(&mut self, image: &RgbImage) -> Result<PredictionSet, BackendError>;

    /// Classify the image. Faults are logged and degrade to an empty set.
    fn predict(&mut self, image: &RgbImage) -> PredictionSet {
        match self.try_predict(image) {
            Ok(predictions) => predictions,
            Err(e) => {
                let id = self.identity();
                tracing::warn!(backend = %id.name, error = %e, "prediction failed; returning empty result");
                PredictionSet::empty()
            }
        }
    }

    fn identity(&self) -> BackendDescriptor;

    /// Cheap, side-effect-free readiness probe.
    fn is_ready(&self) -> bool;
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("generator is not configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("request timed out after {0} seconds")]
    Timeout(u64),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("generator returned an empty sentence")]
    EmptyResponse,
}

/// The two signals handed to the composer. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub gesture: Option<String>,
    pub gesture_confidence: Option<f32>,
    pub emotion: Option<String>,
    pub emotion_confidence: Option<f32>,
}

/// A language backend that turns recognition signals into a sentence.
#[async_trait]
pub trait SentenceGenerator: Send + Sync {
    async fn generate(&self, signals: &Signals) -> Result<String, GenerationError>;

    fn identity(&self) -> BackendDescriptor;

    fn is_ready(&self) -> bool;
}
