//! facegate-hw — Camera access for face capture.
//!
//! Exposes a small media-device abstraction ([`MediaDevices`] /
//! [`MediaStream`]) with a V4L2 implementation that owns the device on a
//! dedicated thread, plus the RGB frame type and its JPEG/PNG encoders.

pub mod camera;
pub mod engine;
pub mod frame;
pub mod media;
pub mod mock;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use engine::{V4l2Devices, V4l2Stream};
pub use frame::{Frame, FrameError};
pub use media::{
    is_secure_origin, FacingMode, MediaConstraints, MediaDevices, MediaError, MediaStream,
    ReadyState, SecureContext,
};
