//! Side-channel metadata shipped next to an ONNX classifier.
//!
//! The file follows the Teachable Machine `metadata.json` layout, extended with
//! optional preprocessing keys:
//!
//! ```json
//! {
//!   "labels": ["hello", "thanks"],
//!   "imageSize": 224,
//!   "layout": "nhwc",
//!   "preprocessing": { "mean": 127.5, "std": 127.5 },
//!   "softmax": false,
//!   "version": "2024.06"
//! }
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

const DEFAULT_IMAGE_SIZE: u32 = 224;
const DEFAULT_MEAN: f32 = 127.5;
const DEFAULT_STD: f32 = 127.5;
const DEFAULT_VERSION: &str = "1.0.0";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata file not found: {0}")]
    NotFound(String),
    #[error("failed to read metadata: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metadata declares no labels")]
    NoLabels,
    #[error("invalid preprocessing: {0}")]
    InvalidPreprocessing(String),
}

/// Memory layout of the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, as in Teachable Machine / TFLite exports.
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`, as in PyTorch exports.
    Nchw,
}

/// How raw 0..=255 pixel values are mapped before inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// `(pixel - mean) / std`
    MeanStd { mean: f32, std: f32 },
    /// `pixel / 255`
    Unit,
}

impl Normalization {
    pub fn apply(self, pixel: u8) -> f32 {
        let p = pixel as f32;
        match self {
            Normalization::MeanStd { mean, std } => (p - mean) / std,
            Normalization::Unit => p / 255.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    outputs: Vec<RawOutput>,
    #[serde(rename = "imageSize")]
    image_size: Option<u32>,
    #[serde(default)]
    layout: TensorLayout,
    preprocessing: Option<RawPreprocessing>,
    #[serde(default)]
    softmax: bool,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPreprocessing {
    mean: Option<f32>,
    std: Option<f32>,
    /// `"unit"` selects [0, 1] scaling instead of mean/std.
    scaling: Option<String>,
}

/// Parsed, validated classifier metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    pub image_size: u32,
    pub layout: TensorLayout,
    pub normalization: Normalization,
    /// Apply softmax to the raw output (for models that emit logits).
    pub softmax: bool,
    pub version: String,
}

impl ModelMetadata {
    /// Metadata for a model that ships without a metadata file.
    pub fn with_labels(labels: Vec<String>) -> Self {
        Self {
            labels,
            image_size: DEFAULT_IMAGE_SIZE,
            layout: TensorLayout::default(),
            normalization: Normalization::MeanStd {
                mean: DEFAULT_MEAN,
                std: DEFAULT_STD,
            },
            softmax: false,
            version: DEFAULT_VERSION.to_string(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        if !path.exists() {
            return Err(MetadataError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let raw: RawMetadata = serde_json::from_str(text)?;

        let labels = if !raw.labels.is_empty() {
            raw.labels
        } else {
            raw.outputs
                .into_iter()
                .next()
                .map(|o| o.labels)
                .unwrap_or_default()
        };
        if labels.is_empty() {
            return Err(MetadataError::NoLabels);
        }

        let normalization = match raw.preprocessing {
            None => Normalization::MeanStd {
                mean: DEFAULT_MEAN,
                std: DEFAULT_STD,
            },
            Some(p) if p.scaling.as_deref() == Some("unit") => Normalization::Unit,
            Some(p) => {
                let std = p.std.unwrap_or(DEFAULT_STD);
                if std <= 0.0 {
                    return Err(MetadataError::InvalidPreprocessing(format!(
                        "std must be positive, got {std}"
                    )));
                }
                Normalization::MeanStd {
                    mean: p.mean.unwrap_or(DEFAULT_MEAN),
                    std,
                }
            }
        };

        let image_size = raw.image_size.unwrap_or(DEFAULT_IMAGE_SIZE);
        if image_size == 0 {
            return Err(MetadataError::InvalidPreprocessing("imageSize must be non-zero".into()));
        }

        Ok(Self {
            labels,
            image_size,
            layout: raw.layout,
            normalization,
            softmax: raw.softmax,
            version: raw.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        })
    }
}
