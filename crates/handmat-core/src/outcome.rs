//! Caller-facing normalization of recognition results.

use crate::types::{Availability, BackendDescriptor, CapabilityClass, ModelStatus, PredictionSet};
use serde::Serialize;

/// What one recognition call reports, whichever backend served it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionOutcome {
    pub label: String,
    pub confidence: f32,
    pub predictions: PredictionSet,
    pub status: ModelStatus,
    pub availability: Availability,
    pub model: BackendDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecognitionOutcome {
    /// Normalize a backend's predictions.
    ///
    /// The top label is replaced by the capability's fallback label (with
    /// confidence 0) when it is below `floor` or spells "nothing recognized".
    /// An empty set means the backend faulted and yields status `Error`.
    pub fn from_predictions(
        capability: CapabilityClass,
        predictions: PredictionSet,
        floor: f32,
        model: BackendDescriptor,
        availability: Availability,
    ) -> Self {
        let Some(top) = predictions.top() else {
            return Self::degraded(capability, model, availability, "recognition failed");
        };

        let (label, confidence) = if top.is_unrecognized() || top.confidence < floor {
            (capability.fallback_label().to_string(), 0.0)
        } else {
            (top.label.clone(), top.confidence)
        };

        Self {
            label,
            confidence,
            predictions,
            status: ModelStatus::Ready,
            availability,
            model,
            message: None,
        }
    }

    /// Result for a capability with no backend at all.
    pub fn unavailable(capability: CapabilityClass) -> Self {
        Self {
            label: capability.fallback_label().to_string(),
            confidence: 0.0,
            predictions: PredictionSet::empty(),
            status: ModelStatus::NoModelAvailable,
            availability: Availability::Unavailable,
            model: BackendDescriptor::unavailable(capability),
            message: Some(format!("no {capability} model available")),
        }
    }

    /// Neutral result for a backend fault. The cause is logged, not returned.
    pub fn degraded(
        capability: CapabilityClass,
        model: BackendDescriptor,
        availability: Availability,
        message: &str,
    ) -> Self {
        Self {
            label: capability.fallback_label().to_string(),
            confidence: 0.0,
            predictions: PredictionSet::empty(),
            status: ModelStatus::Error,
            availability,
            model,
            message: Some(message.to_string()),
        }
    }
}
