//! Color-plane decoder — planar YUV 4:2:0 sensor frames to interleaved RGB.
//!
//! Uses a direct BT.601 full-range colorspace transform rather than the lossy
//! JPEG round trip some capture stacks take. Chroma is sampled at half
//! resolution in both axes (4:2:0). Sources that deliver chroma interleaved
//! (semi-planar) express that through a chroma `pixel_stride` of 2; sources
//! that order V ahead of U are normalized at the frame boundary by naming
//! the planes, not by buffer position.

use crate::types::{ColorImage, Plane, RawFrame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColorError {
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

/// Decode one sensor frame into an RGB image of the same dimensions.
///
/// Fails with [`ColorError::MalformedFrame`] when any plane is too short for
/// the declared geometry; no partial image is ever produced.
pub fn decode_frame(frame: &RawFrame) -> Result<ColorImage, ColorError> {
    let w = frame.width as usize;
    let h = frame.height as usize;
    if w == 0 || h == 0 {
        return Err(ColorError::MalformedFrame(format!(
            "zero dimensions: {w}x{h}"
        )));
    }

    // Chroma planes carry one sample per 2x2 luma block, rounded up for odd
    // dimensions.
    let cw = w.div_ceil(2);
    let ch = h.div_ceil(2);

    check_plane(&frame.y, w, h, "luma")?;
    check_plane(&frame.u, cw, ch, "chroma-U")?;
    check_plane(&frame.v, cw, ch, "chroma-V")?;

    let mut data = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        for col in 0..w {
            let luma = frame.y.data[frame.y.offset(col, row)];
            let cb = frame.u.data[frame.u.offset(col / 2, row / 2)];
            let cr = frame.v.data[frame.v.offset(col / 2, row / 2)];
            let (r, g, b) = yuv_to_rgb(luma, cb, cr);
            data.push(r);
            data.push(g);
            data.push(b);
        }
    }

    Ok(ColorImage {
        width: frame.width,
        height: frame.height,
        data,
    })
}

fn check_plane(plane: &Plane, cols: usize, rows: usize, name: &str) -> Result<(), ColorError> {
    let required = plane.required_len(cols, rows);
    if plane.data.len() < required {
        return Err(ColorError::MalformedFrame(format!(
            "{name} plane too short: {} bytes, {required} required for {cols}x{rows} samples",
            plane.data.len()
        )));
    }
    Ok(())
}

/// BT.601 full-range YUV to RGB.
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402 * v;
    let g = y - 0.344_136 * u - 0.714_136 * v;
    let b = y + 1.772 * u;

    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
