//! mien-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access and the buffer repacking that turns
//! driver formats (YUYV, NV12, YU12, YV12) into the planar frames the
//! pipeline consumes.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameStream, PixelFormat};
