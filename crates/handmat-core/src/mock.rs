//! Randomized stand-ins for the hand and face recognizers.
//!
//! Used when no trained model is installed so the full pipeline can still be
//! exercised. The random source is a type parameter: production code uses an
//! entropy-seeded [`StdRng`], tests pass a fixed seed.

use crate::capability::{BackendError, Recognizer};
use crate::types::{BackendDescriptor, BackendKind, CapabilityClass, Prediction, PredictionSet, UNKNOWN_LABEL};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const MOCK_VERSION: &str = "1.0.0-dev";

/// Thai signs the hand mock favours for its first guess.
const THAI_SIGNS: [&str; 3] = ["สวัสดี", "ฉัน", "กิน"];

const ENGLISH_SIGNS: [&str; 32] = [
    "hello", "world", "thank", "you", "please", "sorry", "yes", "no", "good", "bad", "happy",
    "sad", "love", "family", "friend", "help", "water", "food", "home", "work", "school", "car",
    "time", "day", "night", "sun", "moon", "red", "blue", "green", "big", "small",
];

/// Share of hand calls that report "no gesture".
const HAND_UNKNOWN_RATE: f64 = 0.3;
/// Chance the first hand guess is drawn from [`THAI_SIGNS`].
const HAND_THAI_PREFERENCE: f64 = 0.7;
/// Confidence range per rank of the hand guesses.
const HAND_RANK_CONFIDENCE: [(f32, f32); 3] = [(0.75, 0.95), (0.50, 0.85), (0.20, 0.65)];

/// Dominant-emotion distribution of the face mock.
const FACE_EMOTIONS: [(&str, f32); 7] = [
    ("neutral", 0.30),
    ("happy", 0.25),
    ("sad", 0.15),
    ("surprised", 0.15),
    ("angry", 0.10),
    ("fear", 0.03),
    ("disgust", 0.02),
];

/// Round to three decimals, matching the precision reported to clients.
fn round3(v: f32) -> f32 {
    (v * 1000.0).round() / 1000.0
}

/// Mock hand-gesture recognizer.
pub struct MockHandModel<R = StdRng> {
    rng: R,
}

impl MockHandModel<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for MockHandModel<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> MockHandModel<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    fn labels() -> Vec<String> {
        THAI_SIGNS
            .iter()
            .chain(std::iter::once(&UNKNOWN_LABEL))
            .chain(ENGLISH_SIGNS.iter())
            .map(|s| s.to_string())
            .collect()
    }
}

impl<R: Rng + Send> Recognizer for MockHandModel<R> {
    fn try_predict(&mut self, _image: &RgbImage) -> Result<PredictionSet, BackendError> {
        if self.rng.gen_bool(HAND_UNKNOWN_RATE) {
            return Ok(PredictionSet::unknown());
        }

        let mut used: Vec<&'static str> = Vec::with_capacity(HAND_RANK_CONFIDENCE.len());
        let mut predictions = Vec::with_capacity(HAND_RANK_CONFIDENCE.len());

        for (rank, &(lo, hi)) in HAND_RANK_CONFIDENCE.iter().enumerate() {
            let pool: Vec<&'static str> = if rank == 0 {
                if self.rng.gen_bool(HAND_THAI_PREFERENCE) {
                    THAI_SIGNS.to_vec()
                } else {
                    ENGLISH_SIGNS.to_vec()
                }
            } else {
                THAI_SIGNS
                    .iter()
                    .chain(ENGLISH_SIGNS.iter())
                    .copied()
                    .filter(|label| !used.contains(label))
                    .collect()
            };

            let Some(&label) = pool.choose(&mut self.rng) else {
                break;
            };
            used.push(label);

            let confidence = round3(self.rng.gen_range(lo..hi));
            predictions.push(Prediction::new(label, confidence));
        }

        Ok(PredictionSet::new(predictions))
    }

    fn identity(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: "MockHandModel".into(),
            version: MOCK_VERSION.into(),
            capability: CapabilityClass::Hand,
            kind: BackendKind::Mock,
            loaded: true,
            labels: Self::labels(),
        }
    }

    fn is_ready(&self) -> bool {
        true
    }
}

/// Mock facial-emotion recognizer.
pub struct MockFaceModel<R = StdRng> {
    rng: R,
}

impl MockFaceModel<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl Default for MockFaceModel<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng + Send> MockFaceModel<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Draw an index from [`FACE_EMOTIONS`] according to its weights.
    fn sample_emotion(&mut self) -> usize {
        let total: f32 = FACE_EMOTIONS.iter().map(|(_, w)| w).sum();
        let mut target = self.rng.gen_range(0.0..total);
        for (i, (_, weight)) in FACE_EMOTIONS.iter().enumerate() {
            if target < *weight {
                return i;
            }
            target -= weight;
        }
        FACE_EMOTIONS.len() - 1
    }
}

impl<R: Rng + Send> Recognizer for MockFaceModel<R> {
    fn try_predict(&mut self, _image: &RgbImage) -> Result<PredictionSet, BackendError> {
        let dominant = self.sample_emotion();
        let (label, _) = FACE_EMOTIONS[dominant];

        let confidence = if matches!(label, "neutral" | "happy") {
            self.rng.gen_range(0.70..0.95)
        } else {
            self.rng.gen_range(0.60..0.85)
        };
        let confidence = round3(confidence);

        // Split what is left over two secondary emotions.
        let others: Vec<&str> = FACE_EMOTIONS
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != dominant)
            .map(|(_, (name, _))| *name)
            .collect();
        let secondary: Vec<&str> = others.choose_multiple(&mut self.rng, 2).copied().collect();

        let remaining = (1.0 - confidence).max(0.0);
        let share = self.rng.gen_range(0.5..0.9);
        let first = round3(remaining * share);
        let second = round3((remaining - first).max(0.0));

        let mut predictions = vec![Prediction::new(label, confidence)];
        if let [a, b] = secondary.as_slice() {
            predictions.push(Prediction::new(*a, first));
            predictions.push(Prediction::new(*b, second));
        }

        Ok(PredictionSet::new(predictions))
    }

    fn identity(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: "MockFaceModel".into(),
            version: MOCK_VERSION.into(),
            capability: CapabilityClass::Face,
            kind: BackendKind::Mock,
            loaded: true,
            labels: FACE_EMOTIONS.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }

    fn is_ready(&self) -> bool {
        true
    }
}
