//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, FrameError};
use mien_core::{RawFrame, Rotation};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame conversion failed: {0}")]
    Conversion(#[from] FrameError),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Semi-planar 4:2:0, Y plane then interleaved UV.
    Nv12,
    /// Planar 4:2:0, Y then U then V (I420).
    Yu12,
    /// Planar 4:2:0, Y then V then U.
    Yv12,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    /// Negotiated pixel format.
    pixel_format: PixelFormat,
    /// Upright-rotation hint stamped onto every captured frame. V4L2 has no
    /// orientation sensor; the mount orientation comes from configuration.
    rotation: Rotation,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str, rotation: Rotation) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        // Query capabilities
        let caps = device.query_caps().map_err(|e| {
            CameraError::CaptureFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(CameraError::StreamingNotSupported);
        }

        // Request YUYV at 640x480; accept whichever chroma layout the driver
        // negotiates as long as the repackers understand it.
        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = 640;
        fmt.height = 480;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"NV12") {
            PixelFormat::Nv12
        } else if fourcc == FourCC::new(b"YU12") {
            PixelFormat::Yu12
        } else if fourcc == FourCC::new(b"YV12") {
            PixelFormat::Yv12
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, NV12, YU12, or YV12)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            rotation = rotation.degrees(),
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
            rotation,
        })
    }

    /// Convert a raw driver buffer into a planar frame.
    fn buf_to_frame(&self, buf: &[u8]) -> Result<RawFrame, CameraError> {
        let frame = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_frame(buf, self.width, self.height, self.rotation),
            PixelFormat::Nv12 => frame::nv12_to_frame(buf, self.width, self.height, self.rotation),
            PixelFormat::Yu12 => frame::yu12_to_frame(buf, self.width, self.height, self.rotation),
            PixelFormat::Yv12 => frame::yv12_to_frame(buf, self.width, self.height, self.rotation),
        }?;
        Ok(frame)
    }

    /// Capture a single frame.
    pub fn capture_frame(&self) -> Result<RawFrame, CameraError> {
        let mut stream = self.stream()?;
        stream.next_frame()
    }

    /// Start a capture stream for continuous frame delivery.
    pub fn stream(&self) -> Result<FrameStream<'_>, CameraError> {
        let stream =
            MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4).map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;
        Ok(FrameStream {
            stream,
            camera: self,
        })
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps
                .capabilities
                .contains(v4l::capability::Flags::VIDEO_CAPTURE)
            {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

/// A live capture stream bound to an open camera.
pub struct FrameStream<'a> {
    stream: MmapStream<'a>,
    camera: &'a Camera,
}

impl FrameStream<'_> {
    /// Dequeue the next frame and repack it for the pipeline.
    pub fn next_frame(&mut self) -> Result<RawFrame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;

        tracing::trace!(seq = meta.sequence, bytes = buf.len(), "dequeued frame");
        self.camera.buf_to_frame(buf)
    }
}
