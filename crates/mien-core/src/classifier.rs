//! Emotion classifier adapter — lazy ONNX session and timed forward passes.
//!
//! The classifier handle is created on first use, retried on the next frame
//! after a failed load, and reused for every frame after a successful one.
//! Exactly one tensor in, one score vector out, synchronously on the calling
//! thread; no batching.

use crate::types::EMOTION_CLASS_COUNT;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("expected {EMOTION_CLASS_COUNT} class scores, got {0}")]
    BadScoreArity(usize),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A loaded classifier able to run forward passes.
pub trait EmotionModel: Send + std::fmt::Debug {
    /// One synchronous forward pass: `[1, 3, S, S]` tensor in, raw per-class
    /// scores out.
    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError>;
}

/// MobileNetV2 emotion head via ONNX Runtime.
#[derive(Debug)]
pub struct OnnxEmotionModel {
    session: Session,
}

impl OnnxEmotionModel {
    /// Load the classifier ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded emotion classifier"
        );

        Ok(Self { session })
    }
}

impl EmotionModel for OnnxEmotionModel {
    fn forward(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("score extraction: {e}")))?;

        Ok(scores.to_vec())
    }
}

type Loader = Box<dyn FnMut() -> Result<Box<dyn EmotionModel>, ClassifierError> + Send>;

/// Lazily-initialized, long-lived classifier handle.
///
/// Once a load succeeds the handle is never dropped or re-created for the
/// life of the pipeline; a failed load is retried on the next call.
pub struct LazyClassifier {
    loader: Loader,
    model: Option<Box<dyn EmotionModel>>,
}

impl LazyClassifier {
    /// Handle backed by an ONNX model file, loaded on first use.
    pub fn from_model_file(model_path: impl Into<PathBuf>) -> Self {
        let model_path: PathBuf = model_path.into();
        Self::with_loader(Box::new(move || {
            let model = OnnxEmotionModel::load(&model_path.to_string_lossy())?;
            Ok(Box::new(model) as Box<dyn EmotionModel>)
        }))
    }

    /// Handle with a custom loader (stub models in tests).
    pub fn with_loader(loader: Loader) -> Self {
        Self {
            loader,
            model: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// The loaded model, loading it first if this is the first use (or every
    /// earlier attempt failed).
    pub fn get_or_load(&mut self) -> Result<&mut dyn EmotionModel, ClassifierError> {
        if self.model.is_none() {
            let model = (self.loader)()?;
            tracing::info!("emotion classifier ready");
            self.model = Some(model);
        }
        match self.model.as_deref_mut() {
            Some(model) => Ok(model),
            None => Err(ClassifierError::InferenceFailed(
                "classifier slot empty after load".to_string(),
            )),
        }
    }
}

/// Run one forward pass, measuring wall-clock latency strictly around the
/// call — tensor construction and score decoding are excluded.
///
/// The latency is integer milliseconds; sub-millisecond passes report 0,
/// never a negative or missing value.
pub fn infer(
    model: &mut dyn EmotionModel,
    input: &Array4<f32>,
) -> Result<(Vec<f32>, u64), ClassifierError> {
    let start = Instant::now();
    let scores = model.forward(input)?;
    let latency_ms = start.elapsed().as_millis() as u64;

    if scores.len() != EMOTION_CLASS_COUNT {
        return Err(ClassifierError::BadScoreArity(scores.len()));
    }

    Ok((scores, latency_ms))
}
