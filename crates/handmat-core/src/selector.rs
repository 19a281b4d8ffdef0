//! One-shot backend selection at startup.
//!
//! `Uninitialized → ProbingReal → {RealActive | MockActive | Unavailable}`.
//! The real constructor runs exactly once. Any error (or panic) moves the
//! capability to its fallback for the rest of the process lifetime; there is
//! no retry. Operators restart the process after fixing the model files.

use crate::capability::Recognizer;
use crate::classifier::{ClassifierError, ClassifierSpec, OnnxClassifier};
use crate::types::{Availability, BackendDescriptor, CapabilityClass};
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

/// What to do when the real backend cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Serve randomized mock predictions.
    Mock,
    /// Serve nothing; requests get the neutral "no model" result.
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Uninitialized,
    ProbingReal,
    RealActive,
    MockActive,
    Unavailable,
}

impl SelectionState {
    fn availability(self) -> Availability {
        match self {
            SelectionState::RealActive => Availability::RealActive,
            SelectionState::MockActive => Availability::MockActive,
            _ => Availability::Unavailable,
        }
    }
}

/// Drives the probe for one capability. Consumed by [`select`](Self::select),
/// so a capability can only ever be probed once.
pub struct BackendSelector {
    capability: CapabilityClass,
    policy: FallbackPolicy,
    state: SelectionState,
}

impl BackendSelector {
    pub fn new(capability: CapabilityClass, policy: FallbackPolicy) -> Self {
        Self {
            capability,
            policy,
            state: SelectionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    fn transition(&mut self, next: SelectionState) {
        tracing::debug!(capability = %self.capability, from = ?self.state, to = ?next, "selector transition");
        self.state = next;
    }

    /// Run the real constructor, catching panics. `Err` carries the fault.
    fn attempt_real<F, E>(&mut self, real: F) -> Result<Selection, String>
    where
        F: FnOnce() -> Result<Box<dyn Recognizer>, E>,
        E: Display,
    {
        self.transition(SelectionState::ProbingReal);

        match panic::catch_unwind(AssertUnwindSafe(real)) {
            Ok(Ok(backend)) => {
                self.transition(SelectionState::RealActive);
                let descriptor = backend.identity();
                tracing::info!(
                    capability = %self.capability,
                    backend = %descriptor.name,
                    version = %descriptor.version,
                    "real backend active"
                );
                Ok(Selection {
                    capability: self.capability,
                    state: self.state,
                    descriptor,
                    backend: Some(backend),
                    fault: None,
                })
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("backend constructor panicked".to_string()),
        }
    }

    fn unavailable(mut self, fault: String) -> Selection {
        self.transition(SelectionState::Unavailable);
        tracing::warn!(
            capability = %self.capability,
            reason = %fault,
            "real backend unavailable; no fallback"
        );
        Selection {
            capability: self.capability,
            state: self.state,
            descriptor: BackendDescriptor::unavailable(self.capability),
            backend: None,
            fault: Some(fault),
        }
    }

    /// Try `real` once; fall back according to the policy on any failure.
    pub fn select<F, E, M>(mut self, real: F, mock: M) -> Selection
    where
        F: FnOnce() -> Result<Box<dyn Recognizer>, E>,
        E: Display,
        M: FnOnce() -> Box<dyn Recognizer>,
    {
        let fault = match self.attempt_real(real) {
            Ok(selection) => return selection,
            Err(fault) => fault,
        };

        match self.policy {
            FallbackPolicy::Mock => {
                self.transition(SelectionState::MockActive);
                let backend = mock();
                let descriptor = backend.identity();
                tracing::warn!(
                    capability = %self.capability,
                    reason = %fault,
                    backend = %descriptor.name,
                    "real backend unavailable; falling back to mock"
                );
                Selection {
                    capability: self.capability,
                    state: self.state,
                    descriptor,
                    backend: Some(backend),
                    fault: Some(fault),
                }
            }
            FallbackPolicy::Disabled => self.unavailable(fault),
        }
    }

    /// Try `real` once with no fallback backend; failure is `Unavailable`
    /// regardless of the policy.
    pub fn try_real<F, E>(mut self, real: F) -> Selection
    where
        F: FnOnce() -> Result<Box<dyn Recognizer>, E>,
        E: Display,
    {
        match self.attempt_real(real) {
            Ok(selection) => selection,
            Err(fault) => self.unavailable(fault),
        }
    }
}

/// Outcome of a probe. The state and descriptor never change afterwards.
pub struct Selection {
    capability: CapabilityClass,
    state: SelectionState,
    descriptor: BackendDescriptor,
    backend: Option<Box<dyn Recognizer>>,
    fault: Option<String>,
}

impl Selection {
    pub fn capability(&self) -> CapabilityClass {
        self.capability
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn availability(&self) -> Availability {
        self.state.availability()
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    /// Why the real backend was not selected, if it wasn't.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    /// Hand the active backend to its owner (the engine thread).
    pub fn take_backend(&mut self) -> Option<Box<dyn Recognizer>> {
        self.backend.take()
    }
}

fn load_classifier(spec: &ClassifierSpec) -> Result<Box<dyn Recognizer>, ClassifierError> {
    OnnxClassifier::load(spec).map(|c| Box::new(c) as Box<dyn Recognizer>)
}

/// Probe the ONNX classifier described by `spec`.
pub fn select_classifier<M>(spec: &ClassifierSpec, policy: FallbackPolicy, mock: M) -> Selection
where
    M: FnOnce() -> Box<dyn Recognizer>,
{
    BackendSelector::new(spec.capability, policy).select(|| load_classifier(spec), mock)
}

/// Load the ONNX classifier alone, for diagnostics. Never builds a mock.
pub fn inspect_classifier(spec: &ClassifierSpec) -> Selection {
    BackendSelector::new(spec.capability, FallbackPolicy::Disabled)
        .try_real(|| load_classifier(spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::BackendError;
    use crate::mock::{MockFaceModel, MockHandModel};
    use crate::types::{BackendKind, PredictionSet};
    use image::RgbImage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FakeReal;

    impl Recognizer for FakeReal {
        fn try_predict(&mut self, _image: &RgbImage) -> Result<PredictionSet, BackendError> {
            Ok(PredictionSet::unknown())
        }

        fn identity(&self) -> BackendDescriptor {
            BackendDescriptor {
                name: "FakeReal".into(),
                version: "9".into(),
                capability: CapabilityClass::Hand,
                kind: BackendKind::Production,
                loaded: true,
                labels: vec![],
            }
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    fn mock_hand() -> Box<dyn Recognizer> {
        Box::new(MockHandModel::with_rng(StdRng::seed_from_u64(1)))
    }

    #[test]
    fn test_new_selector_is_uninitialized() {
        let selector = BackendSelector::new(CapabilityClass::Hand, FallbackPolicy::Mock);
        assert_eq!(selector.state(), SelectionState::Uninitialized);
    }

    #[test]
    fn test_successful_probe_is_real_active() {
        let mut selection = BackendSelector::new(CapabilityClass::Hand, FallbackPolicy::Mock)
            .select(|| Ok::<_, String>(Box::new(FakeReal) as Box<dyn Recognizer>), mock_hand);
        assert_eq!(selection.state(), SelectionState::RealActive);
        assert_eq!(selection.availability(), Availability::RealActive);
        assert_eq!(selection.descriptor().name, "FakeReal");
        assert!(selection.fault().is_none());
        assert!(selection.take_backend().is_some());
    }

    #[test]
    fn test_failing_probe_falls_back_to_mock() {
        let selection = BackendSelector::new(CapabilityClass::Hand, FallbackPolicy::Mock)
            .select(|| Err::<Box<dyn Recognizer>, _>("weights corrupt"), mock_hand);
        assert_eq!(selection.availability(), Availability::MockActive);
        assert_eq!(selection.descriptor().kind, BackendKind::Mock);
        assert_eq!(selection.fault(), Some("weights corrupt"));
    }

    #[test]
    fn test_panicking_probe_falls_back_to_mock() {
        let selection = BackendSelector::new(CapabilityClass::Face, FallbackPolicy::Mock).select(
            || -> Result<Box<dyn Recognizer>, String> { panic!("runtime library missing") },
            || Box::new(MockFaceModel::with_rng(StdRng::seed_from_u64(2))) as Box<dyn Recognizer>,
        );
        assert_eq!(selection.availability(), Availability::MockActive);
        assert_eq!(selection.fault(), Some("backend constructor panicked"));
    }

    #[test]
    fn test_missing_model_path_is_mock_active_and_stays_so() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ClassifierSpec {
            capability: CapabilityClass::Hand,
            name: "OnnxHandClassifier".into(),
            model_path: dir.path().join("hand/model.onnx"),
            metadata_path: dir.path().join("hand/metadata.json"),
            default_labels: vec![],
            threshold: 0.7,
        };
        let mut selection = select_classifier(&spec, FallbackPolicy::Mock, mock_hand);
        for _ in 0..5 {
            assert_eq!(selection.availability(), Availability::MockActive);
            assert_eq!(selection.state(), SelectionState::MockActive);
        }
        let fault = selection.fault().unwrap_or_default().to_string();
        assert!(fault.contains("model file not found"), "fault: {fault}");

        // Taking the backend does not change what was selected.
        assert!(selection.take_backend().is_some());
        assert_eq!(selection.availability(), Availability::MockActive);
    }

    #[test]
    fn test_disabled_fallback_is_unavailable() {
        let mut selection = BackendSelector::new(CapabilityClass::Hand, FallbackPolicy::Disabled)
            .select(|| Err::<Box<dyn Recognizer>, _>("no model"), mock_hand);
        assert_eq!(selection.availability(), Availability::Unavailable);
        assert_eq!(selection.descriptor().kind, BackendKind::None);
        assert!(!selection.descriptor().loaded);
        assert!(selection.take_backend().is_none());
    }

    #[test]
    fn test_try_real_without_fallback() {
        let real = BackendSelector::new(CapabilityClass::Hand, FallbackPolicy::Mock)
            .try_real(|| Ok::<_, String>(Box::new(FakeReal) as Box<dyn Recognizer>));
        assert_eq!(real.state(), SelectionState::RealActive);

        // A failed load never serves a mock, even under the mock policy.
        let mut failed = BackendSelector::new(CapabilityClass::Hand, FallbackPolicy::Mock)
            .try_real(|| Err::<Box<dyn Recognizer>, _>("no model"));
        assert_eq!(failed.availability(), Availability::Unavailable);
        assert_eq!(failed.fault(), Some("no model"));
        assert!(failed.take_backend().is_none());
    }

    #[test]
    fn test_inspect_classifier_reports_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let spec = crate::classifier_spec(dir.path(), CapabilityClass::Face, 0.3);
        let selection = inspect_classifier(&spec);
        assert_eq!(selection.availability(), Availability::Unavailable);
        assert_eq!(selection.descriptor().kind, BackendKind::None);
        assert!(selection.fault().unwrap_or_default().contains("model file not found"));
    }
}
