//! handmat-core: gesture and emotion recognition backends.
//!
//! Each capability (hand, face, language) sits behind a trait with mock,
//! ONNX Runtime and remote implementations. A selector picks one backend per
//! capability at startup, and the composer fuses the two recognition signals
//! into a Thai sentence.

pub mod capability;
pub mod classifier;
pub mod compose;
pub mod generator;
pub mod metadata;
pub mod mock;
pub mod outcome;
pub mod selector;
pub mod types;

pub use capability::{BackendError, GenerationError, Recognizer, SentenceGenerator, Signals};
pub use classifier::{ClassifierError, ClassifierSpec, OnnxClassifier};
pub use compose::Composer;
pub use generator::{GeneratorConfig, OpenAiGenerator};
pub use mock::{MockFaceModel, MockHandModel};
pub use outcome::RecognitionOutcome;
pub use selector::{
    inspect_classifier, select_classifier, BackendSelector, FallbackPolicy, Selection, SelectionState,
};
pub use types::{
    Availability, BackendDescriptor, BackendKind, CapabilityClass, ComposedResult, CompositionSource,
    ModelStatus, Prediction, PredictionSet, UNKNOWN_LABEL,
};

/// Emotion labels assumed when a face model ships without `metadata.json`.
pub const DEFAULT_FACE_LABELS: [&str; 7] =
    ["angry", "disgust", "fear", "happy", "sad", "surprised", "neutral"];

/// Model file and metadata file for a capability under `model_dir`.
pub fn model_paths(
    model_dir: &std::path::Path,
    capability: CapabilityClass,
) -> (std::path::PathBuf, std::path::PathBuf) {
    let dir = model_dir.join(capability.dir_name());
    (dir.join("model.onnx"), dir.join("metadata.json"))
}

/// Build the classifier spec for a recognition capability.
pub fn classifier_spec(
    model_dir: &std::path::Path,
    capability: CapabilityClass,
    threshold: f32,
) -> ClassifierSpec {
    let (model_path, metadata_path) = model_paths(model_dir, capability);
    let (name, default_labels): (&str, Vec<String>) = match capability {
        CapabilityClass::Hand => ("OnnxHandClassifier", Vec::new()),
        _ => (
            "OnnxFaceClassifier",
            DEFAULT_FACE_LABELS.iter().map(|s| s.to_string()).collect(),
        ),
    };
    ClassifierSpec {
        capability,
        name: name.to_string(),
        model_path,
        metadata_path,
        default_labels,
        threshold,
    }
}
