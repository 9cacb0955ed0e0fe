use mien_core::{PackingMode, PipelineConfig, Rotation};
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Directory holding bundled model artifacts to extract on first run.
    pub bundle_dir: Option<PathBuf>,
    /// Rotation hint stamped onto captured frames (camera mount orientation).
    pub camera_rotation: Rotation,
    /// Tensor packing mode; must match the shipped classifier.
    pub packing: PackingMode,
    /// Fixed rotation override for the pipeline; None follows the frame hint.
    pub rotation_override: Option<Rotation>,
    /// Whether a degenerate face crop falls back to the whole frame.
    pub whole_frame_on_degenerate_crop: bool,
}

impl Config {
    /// Load configuration from `MIEN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("MIEN_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| mien_core::default_model_dir());

        let bundle_dir = std::env::var("MIEN_BUNDLE_DIR").ok().map(PathBuf::from);

        Self {
            camera_device: std::env::var("MIEN_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            bundle_dir,
            camera_rotation: env_rotation("MIEN_CAMERA_ROTATION").unwrap_or_default(),
            packing: env_var("MIEN_PACKING")
                .and_then(|v| parse_packing(&v))
                .unwrap_or_default(),
            rotation_override: env_rotation("MIEN_ROTATION_OVERRIDE"),
            whole_frame_on_degenerate_crop: std::env::var("MIEN_DEGENERATE_CROP_WHOLE_FRAME")
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }

    /// The per-frame pipeline configuration derived from this daemon config.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            packing: self.packing,
            rotation_override: self.rotation_override,
            whole_frame_on_degenerate_crop: self.whole_frame_on_degenerate_crop,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_rotation(key: &str) -> Option<Rotation> {
    let value = env_var(key)?;
    match parse_rotation(&value) {
        Some(rotation) => Some(rotation),
        None => {
            tracing::warn!(key, value, "ignoring invalid rotation (want 0/90/180/270)");
            None
        }
    }
}

fn parse_rotation(value: &str) -> Option<Rotation> {
    value.trim().parse::<u32>().ok().and_then(Rotation::from_degrees)
}

fn parse_packing(value: &str) -> Option<PackingMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "raw" => Some(PackingMode::Raw),
        "normalized" => Some(PackingMode::Normalized),
        _ => {
            tracing::warn!(value, "ignoring invalid packing mode (want raw|normalized)");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rotation() {
        assert_eq!(parse_rotation("0"), Some(Rotation::Deg0));
        assert_eq!(parse_rotation("90"), Some(Rotation::Deg90));
        assert_eq!(parse_rotation(" 270 "), Some(Rotation::Deg270));
        assert_eq!(parse_rotation("45"), None);
        assert_eq!(parse_rotation("ninety"), None);
    }

    #[test]
    fn test_parse_packing() {
        assert_eq!(parse_packing("raw"), Some(PackingMode::Raw));
        assert_eq!(parse_packing("Normalized"), Some(PackingMode::Normalized));
        assert_eq!(parse_packing("imagenet"), None);
    }
}
