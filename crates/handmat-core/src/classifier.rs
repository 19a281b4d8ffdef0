//! ONNX image classifier via ONNX Runtime.
//!
//! Serves both the hand-gesture and the face-emotion capability: the model
//! file and its metadata decide what the labels mean. Pixel input is resized
//! and normalized as the metadata declares, and predictions below the
//! configured threshold are dropped.

use crate::capability::{BackendError, Recognizer};
use crate::metadata::{MetadataError, ModelMetadata, TensorLayout};
use crate::types::{BackendDescriptor, BackendKind, CapabilityClass, Prediction, PredictionSet};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::PathBuf;
use thiserror::Error;

/// Number of ranked predictions returned per call.
const TOP_K: usize = 3;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}; export the classifier to ONNX and place it in the model directory")]
    ModelNotFound(String),
    #[error("metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Where a classifier's files live and how to interpret them.
#[derive(Debug, Clone)]
pub struct ClassifierSpec {
    pub capability: CapabilityClass,
    pub name: String,
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
    /// Labels to use when the metadata file is absent. Empty means the
    /// metadata file is required.
    pub default_labels: Vec<String>,
    /// Predictions below this confidence are discarded.
    pub threshold: f32,
}

/// ONNX-backed classifier for one capability.
pub struct OnnxClassifier {
    session: Session,
    metadata: ModelMetadata,
    descriptor: BackendDescriptor,
    threshold: f32,
}

impl OnnxClassifier {
    /// Load the model and its metadata. Fails if either is unusable.
    pub fn load(spec: &ClassifierSpec) -> Result<Self, ClassifierError> {
        if !spec.model_path.exists() {
            return Err(ClassifierError::ModelNotFound(
                spec.model_path.display().to_string(),
            ));
        }

        let metadata = match ModelMetadata::load(&spec.metadata_path) {
            Ok(m) => m,
            Err(MetadataError::NotFound(path)) if !spec.default_labels.is_empty() => {
                tracing::info!(%path, "no metadata file; using default labels");
                ModelMetadata::with_labels(spec.default_labels.clone())
            }
            Err(e) => return Err(e.into()),
        };

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(&spec.model_path)?;

        tracing::info!(
            path = %spec.model_path.display(),
            capability = %spec.capability,
            labels = metadata.labels.len(),
            image_size = metadata.image_size,
            layout = ?metadata.layout,
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ONNX classifier"
        );

        let descriptor = BackendDescriptor {
            name: spec.name.clone(),
            version: metadata.version.clone(),
            capability: spec.capability,
            kind: BackendKind::Production,
            loaded: true,
            labels: metadata.labels.clone(),
        };

        Ok(Self {
            session,
            metadata,
            descriptor,
            threshold: spec.threshold,
        })
    }
}

impl Recognizer for OnnxClassifier {
    fn try_predict(&mut self, image: &RgbImage) -> Result<PredictionSet, BackendError> {
        let input = preprocess(image, &self.metadata);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| BackendError::Inference(format!("class scores: {e}")))?;
        let raw: Vec<f32> = raw_data.to_vec();
        drop(outputs);

        if raw.is_empty() {
            return Err(BackendError::Inference("model produced no scores".into()));
        }

        Ok(postprocess(&raw, &self.metadata.labels, self.metadata.softmax, self.threshold))
    }

    fn identity(&self) -> BackendDescriptor {
        self.descriptor.clone()
    }

    fn is_ready(&self) -> bool {
        self.descriptor.loaded
    }
}

/// Resize an RGB image to the model's square input and build a batch-of-one
/// float tensor in the layout and normalization the metadata declares.
fn preprocess(image: &RgbImage, metadata: &ModelMetadata) -> Array4<f32> {
    let size = metadata.image_size;
    let resized = if image.width() == size && image.height() == size {
        image.clone()
    } else {
        image::imageops::resize(image, size, size, FilterType::Triangle)
    };

    let s = size as usize;
    let mut tensor = match metadata.layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
    };

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let v = metadata.normalization.apply(pixel.0[c]);
            match metadata.layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = v,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = v,
            }
        }
    }

    tensor
}

/// Turn raw class scores into ranked predictions.
///
/// Keeps the top [`TOP_K`] classes at or above `threshold`; when none
/// survive the result is the single `Unknown` prediction.
fn postprocess(raw: &[f32], labels: &[String], apply_softmax: bool, threshold: f32) -> PredictionSet {
    let scores = if apply_softmax { softmax(raw) } else { raw.to_vec() };

    let mut ranked: Vec<usize> = (0..scores.len()).filter(|&i| !scores[i].is_nan()).collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let predictions: Vec<Prediction> = ranked
        .into_iter()
        .take(TOP_K)
        .filter(|&idx| scores[idx] >= threshold)
        .map(|idx| {
            let label = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{idx}"));
            Prediction::new(label, scores[idx])
        })
        .collect();

    if predictions.is_empty() {
        PredictionSet::unknown()
    } else {
        PredictionSet::new(predictions)
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|v| v / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Normalization;
    use crate::types::UNKNOWN_LABEL;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn meta(size: u32, layout: TensorLayout, normalization: Normalization) -> ModelMetadata {
        ModelMetadata {
            layout,
            normalization,
            image_size: size,
            ..ModelMetadata::with_labels(labels(&["a"]))
        }
    }

    #[test]
    fn test_preprocess_nhwc_shape() {
        let image = RgbImage::new(64, 48);
        let m = meta(32, TensorLayout::Nhwc, Normalization::Unit);
        let tensor = preprocess(&image, &m);
        assert_eq!(tensor.shape(), &[1, 32, 32, 3]);
    }

    #[test]
    fn test_preprocess_nchw_shape() {
        let image = RgbImage::new(10, 10);
        let m = meta(16, TensorLayout::Nchw, Normalization::Unit);
        let tensor = preprocess(&image, &m);
        assert_eq!(tensor.shape(), &[1, 3, 16, 16]);
    }

    #[test]
    fn test_preprocess_normalization_per_channel() {
        let image = RgbImage::from_pixel(8, 8, image::Rgb([255, 0, 128]));
        let m = meta(8, TensorLayout::Nchw, Normalization::MeanStd { mean: 127.5, std: 127.5 });
        let tensor = preprocess(&image, &m);
        assert!((tensor[[0, 0, 3, 3]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 3, 3]] + 1.0).abs() < 1e-6);
        let expected = (128.0 - 127.5) / 127.5;
        assert!((tensor[[0, 2, 3, 3]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_unit_scaling_nhwc() {
        let image = RgbImage::from_pixel(4, 4, image::Rgb([51, 102, 255]));
        let m = meta(4, TensorLayout::Nhwc, Normalization::Unit);
        let tensor = preprocess(&image, &m);
        assert!((tensor[[0, 1, 2, 0]] - 0.2).abs() < 1e-6);
        assert!((tensor[[0, 1, 2, 1]] - 0.4).abs() < 1e-6);
        assert!((tensor[[0, 1, 2, 2]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_ranks_top_k() {
        let set = postprocess(
            &[0.05, 0.8, 0.1, 0.02, 0.03],
            &labels(&["a", "b", "c", "d", "e"]),
            false,
            0.0,
        );
        let names: Vec<&str> = set.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_postprocess_threshold_forces_unknown() {
        let set = postprocess(&[0.4, 0.35, 0.25], &labels(&["a", "b", "c"]), false, 0.7);
        assert_eq!(set.len(), 1);
        let top = set.top().unwrap();
        assert_eq!(top.label, UNKNOWN_LABEL);
        assert_eq!(top.confidence, 0.0);
    }

    #[test]
    fn test_postprocess_threshold_drops_weak_alternatives() {
        let set = postprocess(&[0.75, 0.2, 0.05], &labels(&["a", "b", "c"]), false, 0.5);
        assert_eq!(set.len(), 1);
        assert_eq!(set.top().unwrap().label, "a");
    }

    #[test]
    fn test_postprocess_skips_nan_scores() {
        let set = postprocess(
            &[0.2, f32::NAN, 0.7, f32::NAN, 0.1],
            &labels(&["a", "b", "c", "d", "e"]),
            false,
            0.0,
        );
        let names: Vec<&str> = set.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "e"]);
    }

    #[test]
    fn test_postprocess_missing_label_uses_index() {
        let set = postprocess(&[0.1, 0.9], &labels(&["only"]), false, 0.0);
        assert_eq!(set.top().unwrap().label, "class_1");
    }

    #[test]
    fn test_postprocess_softmax_logits() {
        let set = postprocess(&[2.0, 1.0, 0.1], &labels(&["a", "b", "c"]), true, 0.0);
        let total: f32 = set.iter().map(|p| p.confidence).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(set.top().unwrap().label, "a");
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!((probs[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ClassifierSpec {
            capability: CapabilityClass::Hand,
            name: "OnnxHandClassifier".into(),
            model_path: dir.path().join("model.onnx"),
            metadata_path: dir.path().join("metadata.json"),
            default_labels: Vec::new(),
            threshold: 0.7,
        };
        assert!(matches!(OnnxClassifier::load(&spec), Err(ClassifierError::ModelNotFound(_))));
    }

    #[test]
    fn test_load_requires_metadata_without_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.onnx");
        std::fs::write(&model_path, b"not a model").unwrap();
        let spec = ClassifierSpec {
            capability: CapabilityClass::Hand,
            name: "OnnxHandClassifier".into(),
            model_path,
            metadata_path: dir.path().join("metadata.json"),
            default_labels: Vec::new(),
            threshold: 0.7,
        };
        assert!(matches!(
            OnnxClassifier::load(&spec),
            Err(ClassifierError::Metadata(MetadataError::NotFound(_)))
        ));
    }
}
