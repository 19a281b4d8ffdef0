//! Sentence composition from a gesture and an emotion.
//!
//! The generative backend is tried first when one is configured. Any failure
//! or empty answer falls through to a fixed template table, so `compose`
//! always yields a sentence.

use crate::capability::{SentenceGenerator, Signals};
use crate::types::{
    Availability, BackendDescriptor, BackendKind, CapabilityClass, ComposedResult, CompositionSource,
};
use std::sync::Arc;

const DEFAULT_GESTURE: &str = "unknown";
const DEFAULT_EMOTION: &str = "neutral";

/// Known (gesture, emotion) pairs and their sentences.
const TEMPLATES: [((&str, &str), &str); 8] = [
    (("hello", "happy"), "คุณดูมีความสุขและกำลังทักทาย"),
    (("hello", "neutral"), "คุณกำลังทักทายอย่างสุภาพ"),
    (("thank_you", "happy"), "คุณกำลังขอบคุณด้วยความยินดี"),
    (("thank_you", "neutral"), "เห็นท่าทางขอบคุณ"),
    (("goodbye", "sad"), "คุณดูเศร้าและกำลังโบกมือลา"),
    (("goodbye", "neutral"), "คุณกำลังลาก่อน"),
    (("yes", "happy"), "คุณกำลังตอบรับด้วยความยินดี"),
    (("no", "neutral"), "คุณกำลังปฏิเสธอย่างสุภาพ"),
];

/// Sentence for a pair, from the table or the generic phrase.
///
/// The table lookup ignores case; the generic phrase keeps the raw labels.
pub fn template_sentence(gesture: &str, emotion: &str) -> String {
    let (g_key, e_key) = (gesture.to_lowercase(), emotion.to_lowercase());
    TEMPLATES
        .iter()
        .find(|((g, e), _)| *g == g_key && *e == e_key)
        .map(|(_, sentence)| sentence.to_string())
        .unwrap_or_else(|| format!("เห็นท่าทาง {gesture} พร้อมสีหน้า {emotion}"))
}

/// Mean of the two confidences when both are positive, otherwise the larger.
pub fn combined_confidence(gesture: Option<f32>, emotion: Option<f32>) -> f32 {
    let g = gesture.unwrap_or(0.0);
    let e = emotion.unwrap_or(0.0);
    if g > 0.0 && e > 0.0 {
        (g + e) / 2.0
    } else {
        g.max(e)
    }
}

pub struct Composer {
    generator: Option<Arc<dyn SentenceGenerator>>,
}

impl Composer {
    /// Composer that only ever uses the template table.
    pub fn template_only() -> Self {
        Self { generator: None }
    }

    pub fn with_generator(generator: Arc<dyn SentenceGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Language capability state: real when a generator is wired in.
    pub fn availability(&self) -> Availability {
        match &self.generator {
            Some(g) if g.is_ready() => Availability::RealActive,
            _ => Availability::MockActive,
        }
    }

    pub fn descriptor(&self) -> BackendDescriptor {
        match &self.generator {
            Some(g) => g.identity(),
            None => BackendDescriptor {
                name: "TemplateComposer".into(),
                version: "1.0.0".into(),
                capability: CapabilityClass::Language,
                kind: BackendKind::Template,
                loaded: true,
                labels: Vec::new(),
            },
        }
    }

    pub async fn compose(&self, signals: &Signals) -> ComposedResult {
        let confidence = combined_confidence(signals.gesture_confidence, signals.emotion_confidence);

        if let Some(generator) = &self.generator {
            match generator.generate(signals).await {
                Ok(sentence) if !sentence.trim().is_empty() => {
                    return ComposedResult {
                        sentence: sentence.trim().to_string(),
                        confidence,
                        source: CompositionSource::Generative,
                    };
                }
                Ok(_) => tracing::warn!("generator returned empty sentence; using template"),
                Err(e) => tracing::warn!(error = %e, "generation failed; using template"),
            }
        }

        let gesture = signals.gesture.as_deref().unwrap_or(DEFAULT_GESTURE);
        let emotion = signals.emotion.as_deref().unwrap_or(DEFAULT_EMOTION);
        ComposedResult {
            sentence: template_sentence(gesture, emotion),
            confidence,
            source: CompositionSource::Template,
        }
    }
}
