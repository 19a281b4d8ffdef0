//! Per-capability recognition service handed to the HTTP handlers.

use crate::engine::{spawn_engine, EngineError, EngineHandle};
use handmat_core::{
    Availability, BackendDescriptor, CapabilityClass, RecognitionOutcome, Selection,
};
use image::RgbImage;

/// Frozen result of startup selection plus the engine serving it.
#[derive(Clone)]
pub struct RecognitionService {
    capability: CapabilityClass,
    availability: Availability,
    descriptor: BackendDescriptor,
    floor: f32,
    engine: Option<EngineHandle>,
    fault: Option<String>,
}

impl RecognitionService {
    /// Start the engine for whatever backend the selector settled on.
    pub fn start(mut selection: Selection, floor: f32) -> Result<Self, EngineError> {
        let capability = selection.capability();
        let engine = selection
            .take_backend()
            .map(|backend| spawn_engine(capability, backend))
            .transpose()?;

        Ok(Self {
            capability,
            availability: selection.availability(),
            descriptor: selection.descriptor().clone(),
            floor,
            engine,
            fault: selection.fault().map(String::from),
        })
    }

    /// Service that always reports "no model available".
    pub fn unavailable(capability: CapabilityClass) -> Self {
        Self {
            capability,
            availability: Availability::Unavailable,
            descriptor: BackendDescriptor::unavailable(capability),
            floor: 0.0,
            engine: None,
            fault: None,
        }
    }

    pub fn capability(&self) -> CapabilityClass {
        self.capability
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Why the real backend is not serving, if it isn't.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Recognize an image. Never fails: faults degrade to a neutral outcome.
    pub async fn recognize(&self, image: RgbImage) -> RecognitionOutcome {
        let Some(engine) = &self.engine else {
            return RecognitionOutcome::unavailable(self.capability);
        };

        match engine.predict(image).await {
            Ok(predictions) => RecognitionOutcome::from_predictions(
                self.capability,
                predictions,
                self.floor,
                self.descriptor.clone(),
                self.availability,
            ),
            Err(e) => {
                tracing::error!(capability = %self.capability, error = %e, "engine unavailable");
                RecognitionOutcome::degraded(
                    self.capability,
                    self.descriptor.clone(),
                    self.availability,
                    "recognition failed",
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handmat_core::{
        BackendSelector, FallbackPolicy, MockFaceModel, ModelStatus, Recognizer, UNKNOWN_LABEL,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mock_face() -> Box<dyn Recognizer> {
        Box::new(MockFaceModel::with_rng(StdRng::seed_from_u64(8)))
    }

    #[tokio::test]
    async fn test_unavailable_service_reports_no_model() {
        let service = RecognitionService::unavailable(CapabilityClass::Hand);
        let outcome = service.recognize(RgbImage::new(4, 4)).await;
        assert_eq!(outcome.label, UNKNOWN_LABEL);
        assert_eq!(outcome.confidence, 0.0);
        assert_eq!(outcome.status, ModelStatus::NoModelAvailable);
    }

    #[tokio::test]
    async fn test_disabled_fallback_starts_without_engine() {
        let selection = BackendSelector::new(CapabilityClass::Face, FallbackPolicy::Disabled)
            .select(|| Err::<Box<dyn Recognizer>, _>("missing"), mock_face);
        let service = RecognitionService::start(selection, 0.5).unwrap();
        assert_eq!(service.availability(), Availability::Unavailable);
        assert_eq!(service.fault(), Some("missing"));
        let outcome = service.recognize(RgbImage::new(4, 4)).await;
        assert_eq!(outcome.label, "neutral");
        assert_eq!(outcome.status, ModelStatus::NoModelAvailable);
    }

    #[tokio::test]
    async fn test_mock_fallback_serves_ready_outcomes() {
        let selection = BackendSelector::new(CapabilityClass::Face, FallbackPolicy::Mock)
            .select(|| Err::<Box<dyn Recognizer>, _>("missing"), mock_face);
        let service = RecognitionService::start(selection, 0.5).unwrap();
        assert_eq!(service.availability(), Availability::MockActive);
        for _ in 0..5 {
            let outcome = service.recognize(RgbImage::new(4, 4)).await;
            assert_eq!(outcome.status, ModelStatus::Ready);
            assert_eq!(outcome.availability, Availability::MockActive);
            assert!(outcome.confidence >= 0.5);
        }
    }
}
