//! Tensor packer — 224×224 RGB crops to planar NCHW float input.
//!
//! The bundled classifier consumes channel-major `[1, 3, 224, 224]` tensors
//! with the planes ordered blue, green, red — the reverse of conventional
//! RGB. That ordering is part of the trained model's contract and is
//! preserved bit-for-bit in both packing modes.

use crate::types::{NormalizedImage, INPUT_SIZE};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// How pixel components are written into the input tensor.
///
/// The chosen mode must match the statistics the classifier was trained
/// with; a mismatch silently produces plausible but wrong scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackingMode {
    /// Raw 0–255 component values cast to float. The diet of the bundled
    /// model.
    #[default]
    Raw,
    /// `(v/255 − mean)/std` per channel with ImageNet statistics.
    Normalized,
}

// ImageNet statistics, indexed R, G, B.
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Pack a normalized crop into the classifier input tensor.
///
/// Element `[0, p, y, x]` is a pure function of pixel `(x, y)` and the
/// packing mode: plane 0 holds blue, plane 1 green, plane 2 red, each plane
/// laid out row-major (`p·S² + y·S + x` in the flat buffer).
pub fn pack(image: &NormalizedImage, mode: PackingMode) -> Array4<f32> {
    let size = INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let (r, g, b) = image.rgb_at(x, y);
            let (blue, green, red) = match mode {
                PackingMode::Raw => (b as f32, g as f32, r as f32),
                PackingMode::Normalized => (
                    normalize_component(b, 2),
                    normalize_component(g, 1),
                    normalize_component(r, 0),
                ),
            };
            tensor[[0, 0, y, x]] = blue;
            tensor[[0, 1, y, x]] = green;
            tensor[[0, 2, y, x]] = red;
        }
    }

    tensor
}

fn normalize_component(value: u8, channel: usize) -> f32 {
    (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
}
