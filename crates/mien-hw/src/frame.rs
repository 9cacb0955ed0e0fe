//! Camera buffer repacking — packed and semi-planar formats into the three
//! planes the pipeline consumes.

use mien_core::{Plane, RawFrame, Rotation};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid {format} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("YUYV requires an even width, got {0}")]
    OddWidth(u32),
}

fn check_len(
    buf: &[u8],
    expected: usize,
    format: &'static str,
) -> Result<(), FrameError> {
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            format,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

fn chroma_dims(width: u32, height: u32) -> (usize, usize) {
    (
        (width as usize).div_ceil(2),
        (height as usize).div_ceil(2),
    )
}

/// Repack packed YUYV 4:2:2 into planar 4:2:0 planes.
///
/// YUYV carries two pixels per 4 bytes: [Y0, U, Y1, V]. Chroma rows are
/// averaged in vertical pairs to reach 4:2:0.
pub fn yuyv_to_frame(
    yuyv: &[u8],
    width: u32,
    height: u32,
    rotation: Rotation,
) -> Result<RawFrame, FrameError> {
    if width % 2 != 0 {
        return Err(FrameError::OddWidth(width));
    }
    let w = width as usize;
    let h = height as usize;
    check_len(yuyv, w * h * 2, "YUYV")?;

    let (cw, ch) = chroma_dims(width, height);

    let mut y = vec![0u8; w * h];
    for row in 0..h {
        for pair in 0..w / 2 {
            let base = (row * w + pair * 2) * 2;
            y[row * w + pair * 2] = yuyv[base];
            y[row * w + pair * 2 + 1] = yuyv[base + 2];
        }
    }

    let mut u = vec![0u8; cw * ch];
    let mut v = vec![0u8; cw * ch];
    for crow in 0..ch {
        let r0 = crow * 2;
        let r1 = (r0 + 1).min(h - 1);
        for pair in 0..cw {
            let b0 = (r0 * w + pair * 2) * 2;
            let b1 = (r1 * w + pair * 2) * 2;
            u[crow * cw + pair] = avg(yuyv[b0 + 1], yuyv[b1 + 1]);
            v[crow * cw + pair] = avg(yuyv[b0 + 3], yuyv[b1 + 3]);
        }
    }

    Ok(RawFrame {
        width,
        height,
        y: Plane::packed(y, w),
        u: Plane::packed(u, cw),
        v: Plane::packed(v, cw),
        rotation,
    })
}

fn avg(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16 + 1) / 2) as u8
}

/// View NV12 (full Y plane followed by interleaved UV) as three planes.
///
/// The chroma stays in its interleaved buffer; a `pixel_stride` of 2
/// describes the layout to the decoder without copying samples apart.
pub fn nv12_to_frame(
    nv12: &[u8],
    width: u32,
    height: u32,
    rotation: Rotation,
) -> Result<RawFrame, FrameError> {
    let w = width as usize;
    let h = height as usize;
    let (cw, ch) = chroma_dims(width, height);
    let y_len = w * h;
    check_len(nv12, y_len + 2 * cw * ch, "NV12")?;

    let uv = &nv12[y_len..y_len + 2 * cw * ch];

    Ok(RawFrame {
        width,
        height,
        y: Plane::packed(nv12[..y_len].to_vec(), w),
        u: Plane {
            data: uv.to_vec(),
            row_stride: 2 * cw,
            pixel_stride: 2,
        },
        v: Plane {
            data: uv[1..].to_vec(),
            row_stride: 2 * cw,
            pixel_stride: 2,
        },
        rotation,
    })
}

/// Split planar YU12 (I420: Y, then U, then V) into frame planes.
pub fn yu12_to_frame(
    buf: &[u8],
    width: u32,
    height: u32,
    rotation: Rotation,
) -> Result<RawFrame, FrameError> {
    planar_to_frame(buf, width, height, rotation, false, "YU12")
}

/// Split planar YV12 (Y, then V, then U) into frame planes.
///
/// YV12 orders V ahead of U in the buffer — a source-specific quirk that is
/// normalized here, at the boundary, by assigning each chroma block to its
/// named plane.
pub fn yv12_to_frame(
    buf: &[u8],
    width: u32,
    height: u32,
    rotation: Rotation,
) -> Result<RawFrame, FrameError> {
    planar_to_frame(buf, width, height, rotation, true, "YV12")
}

fn planar_to_frame(
    buf: &[u8],
    width: u32,
    height: u32,
    rotation: Rotation,
    v_first: bool,
    format: &'static str,
) -> Result<RawFrame, FrameError> {
    let w = width as usize;
    let h = height as usize;
    let (cw, ch) = chroma_dims(width, height);
    let y_len = w * h;
    let c_len = cw * ch;
    check_len(buf, y_len + 2 * c_len, format)?;

    let first = buf[y_len..y_len + c_len].to_vec();
    let second = buf[y_len + c_len..y_len + 2 * c_len].to_vec();
    let (u, v) = if v_first { (second, first) } else { (first, second) };

    Ok(RawFrame {
        width,
        height,
        y: Plane::packed(buf[..y_len].to_vec(), w),
        u: Plane::packed(u, cw),
        v: Plane::packed(v, cw),
        rotation,
    })
}
