//! Model artifact resolution — idempotent extraction of bundled models into
//! the writable model directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("bundled asset missing: {0}")]
    Missing(PathBuf),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Ensure `file_name` exists under `model_dir`, copying it from `bundle_dir`
/// on first access.
///
/// Idempotent: an existing non-empty copy is reused without touching the
/// bundle again. Returns the resolved artifact path.
pub fn ensure_model(
    bundle_dir: &Path,
    model_dir: &Path,
    file_name: &str,
) -> Result<PathBuf, AssetError> {
    let target = model_dir.join(file_name);
    if let Ok(meta) = fs::metadata(&target) {
        if meta.len() > 0 {
            tracing::debug!(path = %target.display(), "model already extracted");
            return Ok(target);
        }
    }

    let source = bundle_dir.join(file_name);
    if !source.exists() {
        return Err(AssetError::Missing(source));
    }

    fs::create_dir_all(model_dir)?;
    let bytes = fs::copy(&source, &target)?;
    tracing::info!(
        source = %source.display(),
        path = %target.display(),
        bytes,
        "extracted bundled model"
    );
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "miend-assets-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_extracts_on_first_access() {
        let root = scratch_dir("first");
        let bundle = root.join("bundle");
        let models = root.join("models");
        fs::create_dir_all(&bundle).unwrap();
        fs::write(bundle.join("m.onnx"), b"weights").unwrap();

        let path = ensure_model(&bundle, &models, "m.onnx").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"weights");
    }

    #[test]
    fn test_existing_copy_is_not_overwritten() {
        let root = scratch_dir("idempotent");
        let bundle = root.join("bundle");
        let models = root.join("models");
        fs::create_dir_all(&bundle).unwrap();
        fs::create_dir_all(&models).unwrap();
        fs::write(bundle.join("m.onnx"), b"v1").unwrap();
        fs::write(models.join("m.onnx"), b"already-extracted").unwrap();

        let path = ensure_model(&bundle, &models, "m.onnx").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"already-extracted");
    }

    #[test]
    fn test_empty_copy_is_replaced() {
        // A zero-length file is a truncated earlier extraction, not a copy.
        let root = scratch_dir("empty");
        let bundle = root.join("bundle");
        let models = root.join("models");
        fs::create_dir_all(&bundle).unwrap();
        fs::create_dir_all(&models).unwrap();
        fs::write(bundle.join("m.onnx"), b"weights").unwrap();
        fs::write(models.join("m.onnx"), b"").unwrap();

        let path = ensure_model(&bundle, &models, "m.onnx").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"weights");
    }

    #[test]
    fn test_missing_bundle_asset() {
        let root = scratch_dir("missing");
        let bundle = root.join("bundle");
        let models = root.join("models");
        fs::create_dir_all(&bundle).unwrap();

        assert!(matches!(
            ensure_model(&bundle, &models, "m.onnx"),
            Err(AssetError::Missing(_))
        ));
    }
}
