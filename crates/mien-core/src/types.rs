use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the classifier's square input crop.
pub const INPUT_SIZE: usize = 224;

/// Number of emotion classes the classifier scores.
pub const EMOTION_CLASS_COUNT: usize = 7;

/// Label reported when the locator ran but found no face in the frame.
pub const NO_FACE_LABEL: &str = "No face Detected";

/// Clockwise rotation that brings a captured sensor frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Parse a capture collaborator's rotation hint. Only quarter turns are
    /// representable; anything else is rejected.
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

/// One byte plane of a sensor frame.
///
/// `row_stride` is the distance in bytes between the starts of two
/// consecutive sample rows; `pixel_stride` between two consecutive samples
/// within a row. Semi-planar sources that interleave their chroma express
/// that with a `pixel_stride` of 2.
#[derive(Debug, Clone)]
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl Plane {
    /// A tightly packed plane (one byte per sample).
    pub fn packed(data: Vec<u8>, row_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride: 1,
        }
    }

    /// Byte offset of sample (x, y).
    pub(crate) fn offset(&self, x: usize, y: usize) -> usize {
        y * self.row_stride + x * self.pixel_stride
    }

    /// One past the highest byte offset touched when sampling a
    /// `cols` × `rows` grid. Zero for an empty grid.
    pub(crate) fn required_len(&self, cols: usize, rows: usize) -> usize {
        if cols == 0 || rows == 0 {
            return 0;
        }
        self.offset(cols - 1, rows - 1) + 1
    }
}

/// One captured sensor frame: a full-resolution luma plane, two
/// half-resolution chroma planes (4:2:0), and the upright-rotation hint.
///
/// Produced by the camera collaborator, consumed by one pipeline pass, and
/// never retained.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y: Plane,
    pub u: Plane,
    pub v: Plane,
    pub rotation: Rotation,
}

/// Interleaved RGB image (3 bytes per pixel, row-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ColorImage {
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = 3 * (y as usize * self.width as usize + x as usize);
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }

    pub fn from_rgb_image(img: &image::RgbImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.as_raw().clone(),
        }
    }

    /// Convert back into an `image::RgbImage`, e.g. for saving a debug crop.
    /// Returns `None` if the buffer length is inconsistent with the
    /// dimensions.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }
}

/// Bounding box of a detected face, in `ColorImage` pixel coordinates.
/// Always lies within the bounds of the image it was detected in; may be
/// zero-sized (a degenerate detection, handled downstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Square crop at the classifier's input resolution, interleaved RGB.
/// Always exactly [`INPUT_SIZE`] × [`INPUT_SIZE`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    data: Vec<u8>,
}

impl NormalizedImage {
    pub(crate) fn from_raw(data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), 3 * INPUT_SIZE * INPUT_SIZE);
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn rgb_at(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let idx = 3 * (y * INPUT_SIZE + x);
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }
}

/// One of the seven emotion classes, in classifier output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Neutral,
    Sad,
    Surprise,
}

impl Emotion {
    /// Map a classifier output index to its emotion class.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Emotion::Angry),
            1 => Some(Emotion::Disgust),
            2 => Some(Emotion::Fear),
            3 => Some(Emotion::Happy),
            4 => Some(Emotion::Neutral),
            5 => Some(Emotion::Sad),
            6 => Some(Emotion::Surprise),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "ANGRY",
            Emotion::Disgust => "DISGUST",
            Emotion::Fear => "FEAR",
            Emotion::Happy => "HAPPY",
            Emotion::Neutral => "NEUTRAL",
            Emotion::Sad => "SAD",
            Emotion::Surprise => "SURPRISE",
        }
    }
}

/// Final per-frame output handed to the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub label: String,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
}

impl InferenceResult {
    pub fn recognized(emotion: Emotion, latency_ms: u64) -> Self {
        Self {
            label: emotion.label().to_string(),
            latency_ms,
        }
    }

    /// Sentinel result for a frame in which no face was found. Inference is
    /// skipped entirely, so the latency is zero by definition.
    pub fn no_face() -> Self {
        Self {
            label: NO_FACE_LABEL.to_string(),
            latency_ms: 0,
        }
    }
}

impl fmt::Display for InferenceResult {
    /// The exact display contract: `"<label> - <latency_ms>ms"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}ms", self.label, self.latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::Deg0));
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(180), Some(Rotation::Deg180));
        assert_eq!(Rotation::from_degrees(270), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::from_degrees(360), None);
    }

    #[test]
    fn test_rotation_degrees_roundtrip() {
        for deg in [0, 90, 180, 270] {
            let rotation = Rotation::from_degrees(deg).unwrap();
            assert_eq!(rotation.degrees(), deg);
        }
    }

    #[test]
    fn test_plane_required_len_packed() {
        let plane = Plane::packed(vec![0; 12], 4);
        assert_eq!(plane.required_len(4, 3), 12);
        assert_eq!(plane.required_len(0, 3), 0);
    }

    #[test]
    fn test_plane_required_len_strided() {
        // 2 cols of interleaved samples, 2 rows, row stride 8:
        // last sample at offset 1*8 + 1*2 = 10, so 11 bytes needed.
        let plane = Plane {
            data: vec![0; 11],
            row_stride: 8,
            pixel_stride: 2,
        };
        assert_eq!(plane.required_len(2, 2), 11);
    }

    #[test]
    fn test_emotion_from_index_table() {
        let expected = [
            (0, "ANGRY"),
            (1, "DISGUST"),
            (2, "FEAR"),
            (3, "HAPPY"),
            (4, "NEUTRAL"),
            (5, "SAD"),
            (6, "SURPRISE"),
        ];
        for (idx, label) in expected {
            assert_eq!(Emotion::from_index(idx).unwrap().label(), label);
        }
        assert_eq!(Emotion::from_index(7), None);
    }

    #[test]
    fn test_result_display_format() {
        let result = InferenceResult::recognized(Emotion::Happy, 12);
        assert_eq!(result.to_string(), "HAPPY - 12ms");
    }

    #[test]
    fn test_no_face_sentinel() {
        let result = InferenceResult::no_face();
        assert_eq!(result.to_string(), "No face Detected - 0ms");
        assert_eq!(result.latency_ms, 0);
    }

    #[test]
    fn test_result_serializes_latency_as_latency_ms() {
        let result = InferenceResult::recognized(Emotion::Sad, 3);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"latencyMs\":3"), "json: {json}");
        assert!(json.contains("\"label\":\"SAD\""), "json: {json}");
    }

    #[test]
    fn test_face_region_degenerate() {
        let region = FaceRegion {
            left: 10,
            top: 10,
            width: 0,
            height: 5,
        };
        assert!(region.is_degenerate());
        let region = FaceRegion {
            left: 10,
            top: 10,
            width: 5,
            height: 5,
        };
        assert!(!region.is_degenerate());
    }

    #[test]
    fn test_color_image_rgb_at() {
        let image = ColorImage {
            width: 2,
            height: 1,
            data: vec![1, 2, 3, 4, 5, 6],
        };
        assert_eq!(image.rgb_at(0, 0), (1, 2, 3));
        assert_eq!(image.rgb_at(1, 0), (4, 5, 6));
    }

    #[test]
    fn test_color_image_rgb_image_roundtrip() {
        let image = ColorImage {
            width: 2,
            height: 2,
            data: (0..12).collect(),
        };
        let rgb = image.to_rgb_image().unwrap();
        assert_eq!(ColorImage::from_rgb_image(&rgb), image);
    }
}
