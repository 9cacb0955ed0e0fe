//! mien-core — per-frame emotion recognition pipeline.
//!
//! Decodes planar YUV sensor frames to RGB, locates a face (SCRFD via ONNX
//! Runtime), normalizes the crop to the classifier's 224×224 input, packs a
//! channel-planar float tensor, and decodes the scored emotion together with
//! the measured forward-pass latency.

pub mod classifier;
pub mod color;
pub mod detector;
pub mod geometry;
pub mod pipeline;
pub mod score;
pub mod tensor;
pub mod types;

pub use pipeline::{FrameOutcome, PipelineConfig, PipelineContext};
pub use tensor::PackingMode;
pub use types::{
    ColorImage, Emotion, FaceRegion, InferenceResult, Plane, RawFrame, Rotation,
};

use std::path::PathBuf;

/// File name of the bundled SCRFD face detection model.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";

/// File name of the bundled MobileNetV2 emotion classifier.
pub const CLASSIFIER_MODEL_FILE: &str = "emotion_mobilenet_v2.onnx";

/// Default directory for model artifacts: `$XDG_DATA_HOME/mien/models`, with
/// the usual `~/.local/share` fallback.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("mien/models")
}
