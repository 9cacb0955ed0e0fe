//! Per-frame orchestration: decode → locate → normalize → pack → infer →
//! label.
//!
//! Every per-frame failure is absorbed into a terminal [`FrameOutcome`]; the
//! pipeline never panics and never stops the stream. The only state carried
//! across frames is the lazily-loaded classifier handle inside
//! [`PipelineContext`].

use crate::classifier::{self, LazyClassifier};
use crate::color;
use crate::detector::{FaceFinder, ScrfdDetector};
use crate::geometry;
use crate::score;
use crate::tensor::{self, PackingMode};
use crate::types::{ColorImage, FaceRegion, InferenceResult, RawFrame, Rotation};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Behavioral switches distinguishing the supported pipeline variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How pixel components are packed into the input tensor. Must match the
    /// statistics the bundled classifier was trained with.
    pub packing: PackingMode,
    /// Fixed rotation override; `None` uses each frame's own hint.
    pub rotation_override: Option<Rotation>,
    /// Whether a zero-area face region falls back to whole-frame geometry.
    /// When false, such frames are reported as having no face.
    pub whole_frame_on_degenerate_crop: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            packing: PackingMode::Raw,
            rotation_override: None,
            whole_frame_on_degenerate_crop: true,
        }
    }
}

/// Outcome of processing one frame.
///
/// Callers must handle every case; only [`FrameOutcome::Recognized`] and
/// [`FrameOutcome::NoFaceDetected`] carry something to display.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// A face (or, with a degraded locator, the whole frame) was classified.
    Recognized(InferenceResult),
    /// The locator ran and found no face; inference was skipped entirely.
    NoFaceDetected,
    /// The classifier could not be loaded, or its forward pass failed; the
    /// next frame retries without invalidating an already-loaded handle.
    ModelUnavailable,
    /// The frame's planes were inconsistent with its declared geometry; the
    /// frame was dropped before any processing.
    Malformed,
}

impl FrameOutcome {
    /// The displayable result for this frame: the recognized emotion, the
    /// no-face sentinel, or nothing for the no-result outcomes.
    pub fn result(&self) -> Option<InferenceResult> {
        match self {
            FrameOutcome::Recognized(result) => Some(result.clone()),
            FrameOutcome::NoFaceDetected => Some(InferenceResult::no_face()),
            FrameOutcome::ModelUnavailable | FrameOutcome::Malformed => None,
        }
    }
}

/// Long-lived pipeline state: configuration, the optional face locator, and
/// the lazily-loaded classifier handle. All per-frame buffers are owned by a
/// single [`PipelineContext::process_frame`] call and released when it
/// returns.
pub struct PipelineContext {
    config: PipelineConfig,
    finder: Option<Box<dyn FaceFinder>>,
    classifier: LazyClassifier,
}

impl PipelineContext {
    pub fn new(
        config: PipelineConfig,
        finder: Option<Box<dyn FaceFinder>>,
        classifier: LazyClassifier,
    ) -> Self {
        Self {
            config,
            finder,
            classifier,
        }
    }

    /// Build a context from a model directory: the SCRFD locator plus the
    /// lazily-loaded emotion classifier.
    ///
    /// A missing or broken locator model degrades to whole-frame
    /// classification rather than failing construction; the classifier is
    /// not touched until the first frame.
    pub fn from_model_dir(config: PipelineConfig, model_dir: &Path) -> Self {
        let detector_path = model_dir.join(crate::DETECTOR_MODEL_FILE);
        let finder = match ScrfdDetector::load(&detector_path.to_string_lossy()) {
            Ok(detector) => Some(Box::new(detector) as Box<dyn FaceFinder>),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "face locator unavailable, classifying whole frames"
                );
                None
            }
        };

        let classifier =
            LazyClassifier::from_model_file(model_dir.join(crate::CLASSIFIER_MODEL_FILE));

        Self::new(config, finder, classifier)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one sensor frame to completion.
    pub fn process_frame(&mut self, frame: &RawFrame) -> FrameOutcome {
        let image = match color::decode_frame(frame) {
            Ok(image) => image,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed frame");
                return FrameOutcome::Malformed;
            }
        };

        self.process_image(&image, frame.rotation)
    }

    /// Process an already-decoded RGB image (the one-shot still-image path;
    /// live capture enters through [`PipelineContext::process_frame`]).
    ///
    /// `rotation` is the upright-correction hint for this image; the
    /// configured override, when set, wins.
    pub fn process_image(&mut self, image: &ColorImage, rotation: Rotation) -> FrameOutcome {
        let pixels = image.width as usize * image.height as usize;
        if pixels == 0 || image.data.len() < pixels * 3 {
            tracing::debug!(
                width = image.width,
                height = image.height,
                bytes = image.data.len(),
                "dropping inconsistent image"
            );
            return FrameOutcome::Malformed;
        }

        // Face search. An inoperative locator is not an error: classification
        // degrades to the whole frame. A locator that ran and found nothing
        // is terminal for the frame.
        let region: Option<FaceRegion> = match &mut self.finder {
            Some(finder) => match finder.locate(image) {
                Ok(Some(region)) => Some(region),
                Ok(None) => return FrameOutcome::NoFaceDetected,
                Err(e) => {
                    tracing::warn!(error = %e, "face locator failed, classifying whole frame");
                    None
                }
            },
            None => None,
        };

        if let Some(r) = &region {
            if r.is_degenerate() && !self.config.whole_frame_on_degenerate_crop {
                tracing::debug!("degenerate face region, treating as no face");
                return FrameOutcome::NoFaceDetected;
            }
        }

        let rotation = self.config.rotation_override.unwrap_or(rotation);
        let crop = geometry::normalize(image, region.as_ref(), rotation);
        let input = tensor::pack(&crop, self.config.packing);

        let model = match self.classifier.get_or_load() {
            Ok(model) => model,
            Err(e) => {
                tracing::warn!(error = %e, "emotion classifier unavailable, retrying next frame");
                return FrameOutcome::ModelUnavailable;
            }
        };

        let (scores, latency_ms) = match classifier::infer(model, &input) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "forward pass failed, no result for this frame");
                return FrameOutcome::ModelUnavailable;
            }
        };

        match score::decode(&scores) {
            Some(emotion) => {
                FrameOutcome::Recognized(InferenceResult::recognized(emotion, latency_ms))
            }
            None => {
                tracing::warn!("score vector decoded to no class");
                FrameOutcome::ModelUnavailable
            }
        }
    }
}
