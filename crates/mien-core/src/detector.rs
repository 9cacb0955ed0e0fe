//! SCRFD face locator via ONNX Runtime.
//!
//! Implements the SCRFD (Sample and Computation Redistribution for Efficient
//! Face Detection) model with 3-stride anchor-free decoding and NMS
//! post-processing. Only the top-ranked face survives: the pipeline
//! classifies one face per frame.

use crate::types::{ColorImage, FaceRegion};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Face localization seam.
///
/// Returns the first face by detector-internal ordering, or `None` when the
/// frame contains no detectable face. Implementations hold no per-frame
/// state; tracking across frames is out of scope.
pub trait FaceFinder: Send {
    fn locate(&mut self, image: &ColorImage) -> Result<Option<FaceRegion>, DetectorError>;
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Candidate detection in source-image coordinates, before clamping.
#[derive(Clone)]
struct Candidate {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// SCRFD-based face locator.
pub struct ScrfdDetector {
    session: Session,
    input_height: usize,
    input_width: usize,
    /// Per-stride output indices [(score, bbox)] for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [StrideOutputIndices; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        let num_outputs = output_names.len();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        // 3 strides × score/bbox. Landmark outputs, when the export carries
        // them, are ignored.
        if num_outputs < 6 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 6 outputs (3 strides × score/bbox), got {num_outputs}"
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            input_height: SCRFD_INPUT_SIZE,
            input_width: SCRFD_INPUT_SIZE,
            stride_indices,
        })
    }

    /// Preprocess an RGB image into a NCHW float tensor with letterbox
    /// padding, each channel normalized to the SCRFD input distribution.
    fn preprocess(&self, image: &ColorImage) -> (Array4<f32>, LetterboxInfo) {
        let src_w = image.width as usize;
        let src_h = image.height as usize;

        // Compute letterbox scale (fit within input_width × input_height)
        let scale_w = self.input_width as f32 / src_w as f32;
        let scale_h = self.input_height as f32 / src_h as f32;
        let scale = scale_w.min(scale_h);

        let new_w = (src_w as f32 * scale).round() as usize;
        let new_h = (src_h as f32 * scale).round() as usize;
        let pad_x = (self.input_width - new_w) as f32 / 2.0;
        let pad_y = (self.input_height - new_h) as f32 / 2.0;

        let letterbox = LetterboxInfo { scale, pad_x, pad_y };

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;
        let inv_scale = 1.0 / scale;

        // Pad value SCRFD_MEAN normalizes to 0.0.
        let mut tensor = Array4::<f32>::from_elem(
            (1, 3, self.input_height, self.input_width),
            0.0,
        );

        for y in 0..self.input_height {
            for x in 0..self.input_width {
                let inside = y >= pad_y_start
                    && y < pad_y_start + new_h
                    && x >= pad_x_start
                    && x < pad_x_start + new_w;

                let (r, g, b) = if inside {
                    // Bilinear sample from the source image.
                    let src_x = ((x - pad_x_start) as f32 + 0.5) * inv_scale - 0.5;
                    let src_y = ((y - pad_y_start) as f32 + 0.5) * inv_scale - 0.5;

                    let x0 = (src_x.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
                    let x1 = (x0 + 1).min(src_w - 1);
                    let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

                    let y0 = (src_y.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
                    let y1 = (y0 + 1).min(src_h - 1);
                    let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

                    let mut rgb = [0.0f32; 3];
                    for (channel, value) in rgb.iter_mut().enumerate() {
                        let tl = image.data[3 * (y0 * src_w + x0) + channel] as f32;
                        let tr = image.data[3 * (y0 * src_w + x1) + channel] as f32;
                        let bl = image.data[3 * (y1 * src_w + x0) + channel] as f32;
                        let br = image.data[3 * (y1 * src_w + x1) + channel] as f32;
                        *value = tl * (1.0 - fx) * (1.0 - fy)
                            + tr * fx * (1.0 - fy)
                            + bl * (1.0 - fx) * fy
                            + br * fx * fy;
                    }
                    (rgb[0], rgb[1], rgb[2])
                } else {
                    (SCRFD_MEAN, SCRFD_MEAN, SCRFD_MEAN)
                };

                tensor[[0, 0, y, x]] = (r - SCRFD_MEAN) / SCRFD_STD;
                tensor[[0, 1, y, x]] = (g - SCRFD_MEAN) / SCRFD_STD;
                tensor[[0, 2, y, x]] = (b - SCRFD_MEAN) / SCRFD_STD;
            }
        }

        (tensor, letterbox)
    }
}

impl FaceFinder for ScrfdDetector {
    /// Locate the best face in the image, clamped into image bounds.
    fn locate(&mut self, image: &ColorImage) -> Result<Option<FaceRegion>, DetectorError> {
        let (input, letterbox) = self.preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut all_detections = Vec::new();

        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;

            let dets = decode_stride(
                scores,
                bboxes,
                stride,
                self.input_width,
                self.input_height,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            );
            all_detections.extend(dets);
        }

        let mut ranked = nms(all_detections, SCRFD_NMS_THRESHOLD);
        ranked.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(ranked
            .first()
            .map(|best| clamp_region(best, image.width, image.height)))
    }
}

/// Discover output tensor ordering by name.
///
/// SCRFD exports may name tensors "score_8", "bbox_16", ... or use generic
/// numeric names. When the named pattern is present the names win; otherwise
/// the standard positional ordering applies:
///   [0-2] = scores (strides 8, 16, 32)
///   [3-5] = bboxes (strides 8, 16, 32)
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = SCRFD_STRIDES
        .iter()
        .all(|&stride| find("score", stride).is_some() && find("bbox", stride).is_some());

    if named {
        tracing::info!("SCRFD: using name-based output tensor mapping");
        std::array::from_fn(|i| {
            let stride = SCRFD_STRIDES[i];
            (
                find("score", stride).unwrap(),
                find("bbox", stride).unwrap(),
            )
        })
    } else {
        tracing::info!(
            ?names,
            "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
        );
        [(0, 3), (1, 4), (2, 5)]
    }
}

/// Decode detections for a single stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    input_width: usize,
    input_height: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<Candidate> {
    let grid_h = input_height / stride;
    let grid_w = input_width / stride;
    let num_anchors = grid_h * grid_w * SCRFD_ANCHORS_PER_CELL;

    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let cy = (anchor_idx / grid_w) as f32;
        let cx = (anchor_idx % grid_w) as f32;

        let anchor_cx = cx * stride as f32;
        let anchor_cy = cy * stride as f32;

        // Decode bbox: [x1_offset, y1_offset, x2_offset, y2_offset] * stride
        let bbox_off = idx * 4;
        if bbox_off + 3 >= bboxes.len() {
            continue;
        }
        let x1 = anchor_cx - bboxes[bbox_off] * stride as f32;
        let y1 = anchor_cy - bboxes[bbox_off + 1] * stride as f32;
        let x2 = anchor_cx + bboxes[bbox_off + 2] * stride as f32;
        let y2 = anchor_cy + bboxes[bbox_off + 3] * stride as f32;

        // Map from letterboxed space to original image space
        let orig_x1 = (x1 - letterbox.pad_x) / letterbox.scale;
        let orig_y1 = (y1 - letterbox.pad_y) / letterbox.scale;
        let orig_x2 = (x2 - letterbox.pad_x) / letterbox.scale;
        let orig_y2 = (y2 - letterbox.pad_y) / letterbox.scale;

        detections.push(Candidate {
            x: orig_x1,
            y: orig_y1,
            width: orig_x2 - orig_x1,
            height: orig_y2 - orig_y1,
            confidence: score,
        });
    }

    detections
}

/// Non-Maximum Suppression: remove overlapping detections.
fn nms(mut detections: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two candidate boxes.
fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter_w = (x2 - x1).max(0.0);
    let inter_h = (y2 - y1).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = a.width * a.height;
    let area_b = b.width * b.height;
    let union_area = area_a + area_b - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

/// Clamp a candidate box into image bounds. The result may be degenerate
/// (zero width or height) when the candidate lies entirely outside; callers
/// handle that downstream.
fn clamp_region(candidate: &Candidate, image_width: u32, image_height: u32) -> FaceRegion {
    let left = candidate.x.max(0.0).min(image_width as f32) as u32;
    let top = candidate.y.max(0.0).min(image_height as f32) as u32;
    let right = (candidate.x + candidate.width)
        .max(0.0)
        .min(image_width as f32) as u32;
    let bottom = (candidate.y + candidate.height)
        .max(0.0)
        .min(image_height as f32) as u32;

    FaceRegion {
        left,
        top,
        width: right.saturating_sub(left),
        height: bottom.saturating_sub(top),
    }
}
