use serde::{Deserialize, Serialize};

/// Label reported when a backend cannot name what it sees.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Labels that mean "nothing recognized", compared case-insensitively.
const UNRECOGNIZED_LABELS: [&str; 3] = ["unknown", "unrecognized", "none"];

/// The kind of signal a backend produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityClass {
    Hand,
    Face,
    Language,
}

impl CapabilityClass {
    /// Label returned to callers when this capability has nothing better to say.
    pub fn fallback_label(self) -> &'static str {
        match self {
            CapabilityClass::Hand => UNKNOWN_LABEL,
            CapabilityClass::Face => "neutral",
            CapabilityClass::Language => "",
        }
    }

    /// Directory name under the model root holding this capability's files.
    pub fn dir_name(self) -> &'static str {
        match self {
            CapabilityClass::Hand => "hand",
            CapabilityClass::Face => "face",
            CapabilityClass::Language => "language",
        }
    }
}

impl std::fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.dir_name())
    }
}

/// Which family of implementation sits behind a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Mock,
    Production,
    Remote,
    Template,
    None,
}

/// Static identity of a backend. Built once when the backend is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub name: String,
    pub version: String,
    pub capability: CapabilityClass,
    pub kind: BackendKind,
    pub loaded: bool,
    /// Labels the backend can emit (empty for language backends).
    #[serde(default)]
    pub labels: Vec<String>,
}

impl BackendDescriptor {
    /// Descriptor used when no backend could be selected for a capability.
    pub fn unavailable(capability: CapabilityClass) -> Self {
        Self {
            name: "None".into(),
            version: "N/A".into(),
            capability,
            kind: BackendKind::None,
            loaded: false,
            labels: Vec::new(),
        }
    }
}

/// A single label/confidence pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Always within [0, 1]; exactly 0 for [`UNKNOWN_LABEL`].
    pub confidence: f32,
}

impl Prediction {
    /// Build a prediction, clamping the confidence into [0, 1].
    ///
    /// NaN becomes 0 and an `Unknown` label always carries 0.
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        let label = label.into();
        let confidence = if label == UNKNOWN_LABEL || confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { label, confidence }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_LABEL, 0.0)
    }

    /// True when the label is one of the "nothing recognized" spellings.
    pub fn is_unrecognized(&self) -> bool {
        let lower = self.label.to_lowercase();
        UNRECOGNIZED_LABELS.contains(&lower.as_str())
    }
}

/// Predictions sorted by descending confidence. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionSet(Vec<Prediction>);

impl PredictionSet {
    /// Sort predictions by confidence, highest first. Confidences are already
    /// clamped by [`Prediction::new`], so the ordering is total.
    pub fn new(mut predictions: Vec<Prediction>) -> Self {
        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self(predictions)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn unknown() -> Self {
        Self(vec![Prediction::unknown()])
    }

    pub fn top(&self) -> Option<&Prediction> {
        self.0.first()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Prediction> {
        self.0
    }
}

/// Outcome tag on every recognition response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelStatus {
    NoModelAvailable,
    Ready,
    Error,
}

/// Which backend a capability settled on at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    Unavailable,
    MockActive,
    RealActive,
}

impl Availability {
    pub fn is_serving(self) -> bool {
        !matches!(self, Availability::Unavailable)
    }
}

/// Which path of the composer produced the sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionSource {
    Generative,
    Template,
}

/// Sentence fused from a gesture signal and an emotion signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedResult {
    pub sentence: String,
    pub confidence: f32,
    pub source: CompositionSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_clamps_confidence() {
        assert_eq!(Prediction::new("hello", 1.7).confidence, 1.0);
        assert_eq!(Prediction::new("hello", -0.2).confidence, 0.0);
        assert_eq!(Prediction::new("hello", f32::NAN).confidence, 0.0);
        assert!((Prediction::new("hello", 0.42).confidence - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_label_has_zero_confidence() {
        assert_eq!(Prediction::new(UNKNOWN_LABEL, 0.83).confidence, 0.0);
        assert_eq!(Prediction::unknown().confidence, 0.0);
    }

    #[test]
    fn test_unrecognized_spellings() {
        assert!(Prediction::new("none", 0.4).is_unrecognized());
        assert!(Prediction::new("UNRECOGNIZED", 0.4).is_unrecognized());
        assert!(!Prediction::new("hello", 0.4).is_unrecognized());
    }

    #[test]
    fn test_prediction_set_sorted_descending() {
        let set = PredictionSet::new(vec![
            Prediction::new("a", 0.2),
            Prediction::new("b", 0.9),
            Prediction::new("c", 0.5),
        ]);
        let labels: Vec<&str> = set.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "c", "a"]);
        assert_eq!(set.top().map(|p| p.label.as_str()), Some("b"));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ModelStatus::NoModelAvailable).unwrap(),
            "no-model-available"
        );
        assert_eq!(serde_json::to_value(Availability::MockActive).unwrap(), "mock-active");
        assert_eq!(serde_json::to_value(CompositionSource::Template).unwrap(), "template");
    }

    #[test]
    fn test_prediction_set_serializes_as_array() {
        let set = PredictionSet::new(vec![Prediction::new("hello", 0.5)]);
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["label"], "hello");
    }
}
