//! Geometric normalizer — face crop, upright rotation, stretch-resize.
//!
//! Produces the classifier's fixed 224×224 input from an arbitrary frame:
//! crop to the face region when one is present, rotate the crop upright per
//! the capture hint, then resize with bilinear filtering. The resize is a
//! direct stretch on both axes; no aspect-preserving letterbox.

use crate::types::{ColorImage, FaceRegion, NormalizedImage, Rotation, INPUT_SIZE};

/// Normalize a frame (or its face crop) into the classifier input.
///
/// A degenerate region (zero width or height) falls back to the whole frame
/// rather than producing an empty crop.
pub fn normalize(
    image: &ColorImage,
    region: Option<&FaceRegion>,
    rotation: Rotation,
) -> NormalizedImage {
    let cropped = match region {
        Some(r) if !r.is_degenerate() => crop(image, r),
        Some(_) => {
            tracing::debug!("degenerate face region, using whole frame");
            image.clone()
        }
        None => image.clone(),
    };
    let upright = rotate(&cropped, rotation);
    resize_to_input(&upright)
}

/// Extract the region's pixels. Coordinates outside the image are clamped
/// rather than read out of bounds.
fn crop(image: &ColorImage, region: &FaceRegion) -> ColorImage {
    let left = region.left.min(image.width.saturating_sub(1)) as usize;
    let top = region.top.min(image.height.saturating_sub(1)) as usize;
    let right = (region.left + region.width).min(image.width) as usize;
    let bottom = (region.top + region.height).min(image.height) as usize;

    let out_w = right.saturating_sub(left);
    let out_h = bottom.saturating_sub(top);

    let src_w = image.width as usize;
    let mut data = Vec::with_capacity(out_w * out_h * 3);
    for y in top..bottom {
        let row_start = 3 * (y * src_w + left);
        data.extend_from_slice(&image.data[row_start..row_start + 3 * out_w]);
    }

    ColorImage {
        width: out_w as u32,
        height: out_h as u32,
        data,
    }
}

/// Rotate by an exact quarter turn (clockwise) via index remapping.
fn rotate(image: &ColorImage, rotation: Rotation) -> ColorImage {
    let w = image.width as usize;
    let h = image.height as usize;

    let (out_w, out_h) = match rotation {
        Rotation::Deg0 | Rotation::Deg180 => (w, h),
        Rotation::Deg90 | Rotation::Deg270 => (h, w),
    };

    if rotation == Rotation::Deg0 {
        return image.clone();
    }

    let mut data = vec![0u8; w * h * 3];
    for dy in 0..out_h {
        for dx in 0..out_w {
            let (sx, sy) = match rotation {
                Rotation::Deg0 => (dx, dy),
                Rotation::Deg90 => (dy, h - 1 - dx),
                Rotation::Deg180 => (w - 1 - dx, h - 1 - dy),
                Rotation::Deg270 => (w - 1 - dy, dx),
            };
            let src = 3 * (sy * w + sx);
            let dst = 3 * (dy * out_w + dx);
            data[dst..dst + 3].copy_from_slice(&image.data[src..src + 3]);
        }
    }

    ColorImage {
        width: out_w as u32,
        height: out_h as u32,
        data,
    }
}

/// Stretch-resize to [`INPUT_SIZE`] square using bilinear interpolation.
fn resize_to_input(image: &ColorImage) -> NormalizedImage {
    let src_w = image.width as usize;
    let src_h = image.height as usize;
    let size = INPUT_SIZE;

    // Independent scale per axis: non-square inputs are stretched, not
    // letterboxed.
    let inv_scale_x = src_w as f32 / size as f32;
    let inv_scale_y = src_h as f32 / size as f32;

    let mut data = vec![0u8; size * size * 3];
    for y in 0..size {
        let src_y = (y as f32 + 0.5) * inv_scale_y - 0.5;
        let y0 = (src_y.floor() as i32).clamp(0, src_h as i32 - 1) as usize;
        let y1 = (y0 + 1).min(src_h - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..size {
            let src_x = (x as f32 + 0.5) * inv_scale_x - 0.5;
            let x0 = (src_x.floor() as i32).clamp(0, src_w as i32 - 1) as usize;
            let x1 = (x0 + 1).min(src_w - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            for channel in 0..3 {
                let tl = image.data[3 * (y0 * src_w + x0) + channel] as f32;
                let tr = image.data[3 * (y0 * src_w + x1) + channel] as f32;
                let bl = image.data[3 * (y1 * src_w + x0) + channel] as f32;
                let br = image.data[3 * (y1 * src_w + x1) + channel] as f32;

                let val = tl * (1.0 - fx) * (1.0 - fy)
                    + tr * fx * (1.0 - fy)
                    + bl * (1.0 - fx) * fy
                    + br * fx * fy;

                data[3 * (y * size + x) + channel] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    NormalizedImage::from_raw(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: (u8, u8, u8)) -> ColorImage {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2]);
        }
        ColorImage {
            width,
            height,
            data,
        }
    }

    /// 2x3 image where each pixel's red channel encodes its (x, y).
    fn indexed_2x3() -> ColorImage {
        let mut data = Vec::new();
        for y in 0..3u8 {
            for x in 0..2u8 {
                data.extend_from_slice(&[10 * y + x, 0, 0]);
            }
        }
        ColorImage {
            width: 2,
            height: 3,
            data,
        }
    }

    #[test]
    fn test_output_always_input_size() {
        let image = solid(64, 48, (10, 20, 30));
        let region = FaceRegion {
            left: 8,
            top: 8,
            width: 16,
            height: 20,
        };
        let degenerate = FaceRegion {
            left: 8,
            top: 8,
            width: 0,
            height: 20,
        };

        for (region, rotation) in [
            (None, Rotation::Deg0),
            (Some(&region), Rotation::Deg0),
            (Some(&region), Rotation::Deg90),
            (Some(&degenerate), Rotation::Deg180),
            (None, Rotation::Deg270),
        ] {
            let out = normalize(&image, region, rotation);
            assert_eq!(out.data().len(), 3 * INPUT_SIZE * INPUT_SIZE);
        }
    }

    #[test]
    fn test_degenerate_region_falls_back_to_whole_frame() {
        let image = solid(32, 32, (40, 50, 60));
        let degenerate = FaceRegion {
            left: 4,
            top: 4,
            width: 0,
            height: 0,
        };
        let with_degenerate = normalize(&image, Some(&degenerate), Rotation::Deg0);
        let whole_frame = normalize(&image, None, Rotation::Deg0);
        assert_eq!(with_degenerate, whole_frame);
    }

    #[test]
    fn test_crop_extracts_region_pixels() {
        // 4x4 image, bottom-right 2x2 block painted white.
        let mut image = solid(4, 4, (0, 0, 0));
        for y in 2..4u32 {
            for x in 2..4u32 {
                let idx = 3 * (y * 4 + x) as usize;
                image.data[idx..idx + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        let region = FaceRegion {
            left: 2,
            top: 2,
            width: 2,
            height: 2,
        };
        let cropped = crop(&image, &region);
        assert_eq!(cropped.width, 2);
        assert_eq!(cropped.height, 2);
        assert!(cropped.data.iter().all(|&b| b == 255));
    }

    #[test]
    fn test_crop_clamps_overflowing_region() {
        let image = solid(8, 8, (1, 2, 3));
        let region = FaceRegion {
            left: 6,
            top: 6,
            width: 10,
            height: 10,
        };
        let cropped = crop(&image, &region);
        assert_eq!(cropped.width, 2);
        assert_eq!(cropped.height, 2);
    }

    #[test]
    fn test_rotate_90_clockwise() {
        let image = indexed_2x3();
        let rotated = rotate(&image, Rotation::Deg90);
        assert_eq!(rotated.width, 3);
        assert_eq!(rotated.height, 2);
        // Source top-left (0,0) ends up top-right; bottom-left (0,2)
        // ends up top-left.
        assert_eq!(rotated.rgb_at(2, 0).0, 0); // was (0,0)
        assert_eq!(rotated.rgb_at(0, 0).0, 20); // was (0,2)
        assert_eq!(rotated.rgb_at(0, 1).0, 21); // was (1,2)
        assert_eq!(rotated.rgb_at(2, 1).0, 1); // was (1,0)
    }

    #[test]
    fn test_rotate_180() {
        let image = indexed_2x3();
        let rotated = rotate(&image, Rotation::Deg180);
        assert_eq!(rotated.width, 2);
        assert_eq!(rotated.height, 3);
        assert_eq!(rotated.rgb_at(0, 0).0, 21); // was (1,2)
        assert_eq!(rotated.rgb_at(1, 2).0, 0); // was (0,0)
    }

    #[test]
    fn test_rotate_270_inverts_rotate_90() {
        let image = indexed_2x3();
        let there_and_back = rotate(&rotate(&image, Rotation::Deg90), Rotation::Deg270);
        assert_eq!(there_and_back, image);
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let image = solid(37, 61, (90, 100, 110));
        let out = resize_to_input(&image);
        for chunk in out.data().chunks_exact(3) {
            assert_eq!(chunk, &[90, 100, 110]);
        }
    }

    #[test]
    fn test_resize_stretches_without_letterbox() {
        // Left half red, right half blue, twice as wide as tall. A stretch
        // keeps the halves at the horizontal midpoint; a letterbox would
        // leave padding bands instead.
        let mut image = solid(8, 4, (255, 0, 0));
        for y in 0..4u32 {
            for x in 4..8u32 {
                let idx = 3 * (y * 8 + x) as usize;
                image.data[idx..idx + 3].copy_from_slice(&[0, 0, 255]);
            }
        }
        let out = resize_to_input(&image);
        let (r, _, b) = out.rgb_at(4, INPUT_SIZE / 2);
        assert!(r > 200 && b < 50, "left edge should be red: r={r} b={b}");
        let (r, _, b) = out.rgb_at(INPUT_SIZE - 5, INPUT_SIZE / 2);
        assert!(b > 200 && r < 50, "right edge should be blue: r={r} b={b}");
    }

    #[test]
    fn test_normalize_crop_then_rotate_order() {
        // Face region in the top-left of a frame rotated 180: cropping first
        // then rotating yields the region's own pixels upside down, which for
        // a solid block is just the block.
        let mut image = solid(16, 16, (0, 0, 0));
        for y in 0..4u32 {
            for x in 0..4u32 {
                let idx = 3 * (y * 16 + x) as usize;
                image.data[idx..idx + 3].copy_from_slice(&[200, 200, 200]);
            }
        }
        let region = FaceRegion {
            left: 0,
            top: 0,
            width: 4,
            height: 4,
        };
        let out = normalize(&image, Some(&region), Rotation::Deg180);
        // Every output pixel comes from the painted block.
        assert!(out.data().iter().all(|&b| b == 200));
    }
}
