//! Media device abstraction.
//!
//! Mirrors the shape of a browser media stack: a [`MediaDevices`] source
//! hands out [`MediaStream`]s that expose live-track counts, a buffered
//! data readiness level and single-frame grabs.

use crate::frame::Frame;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    User,
    Environment,
}

/// Requested stream properties. Sizes are preferences, not requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: FacingMode,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing_mode: FacingMode::User,
            audio: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("no camera found: {0}")]
    NotFound(String),
    #[error("camera is in use by another application")]
    Busy,
    #[error("constraint not supported: {0}")]
    Overconstrained(String),
    #[error("camera access requires a secure context")]
    InsecureContext,
    #[error("stream has ended")]
    Ended,
    #[error("{0}")]
    Other(String),
}

impl MediaError {
    /// Operator-facing text for the capture panel's message target.
    pub fn user_message(&self) -> String {
        let detail = match self {
            MediaError::PermissionDenied(_) => "Camera permission denied".to_string(),
            MediaError::NotFound(_) => "No camera found on this device".to_string(),
            MediaError::Busy => "Camera is already in use by another application".to_string(),
            MediaError::Overconstrained(what) => {
                format!("Camera does not support the requested {what}")
            }
            MediaError::InsecureContext => {
                "Camera access requires HTTPS or a local connection".to_string()
            }
            MediaError::Ended => "Camera stream has stopped".to_string(),
            MediaError::Other(msg) => msg.clone(),
        };
        format!("❌ Camera Error: {detail}")
    }
}

/// How much data a stream has buffered, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }
}

#[async_trait]
pub trait MediaStream: Send + Sync {
    /// Unique id of this stream.
    fn id(&self) -> &str;

    /// Tracks that have not been stopped.
    fn live_tracks(&self) -> usize;

    fn ready_state(&self) -> ReadyState;

    /// Native resolution of the video track.
    fn video_size(&self) -> (u32, u32);

    /// Snapshot the current frame.
    async fn grab_frame(&self) -> Result<Frame, MediaError>;

    /// Stop every track and release the device.
    async fn stop(&mut self);
}

#[async_trait]
pub trait MediaDevices: Send + Sync {
    type Stream: MediaStream;

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Self::Stream, MediaError>;
}

/// True when `url` is `https`, or `http` against a loopback host.
pub fn is_secure_origin(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once("://") else {
        return false;
    };
    match scheme.to_ascii_lowercase().as_str() {
        "https" => true,
        "http" => {
            let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
            let authority = authority.rsplit('@').next().unwrap_or_default();
            let host = if let Some(v6) = authority.strip_prefix('[') {
                v6.split(']').next().unwrap_or_default()
            } else {
                authority.split(':').next().unwrap_or_default()
            };
            let host = host.to_ascii_lowercase();
            host == "localhost"
                || host.ends_with(".localhost")
                || host == "::1"
                || host
                    .parse::<std::net::Ipv4Addr>()
                    .is_ok_and(|ip| ip.is_loopback())
        }
        _ => false,
    }
}

/// Refuses capture unless the backend origin is secure.
pub struct SecureContext<D> {
    inner: D,
    secure: bool,
}

impl<D> SecureContext<D> {
    pub fn new(inner: D, origin: &str) -> Self {
        let secure = is_secure_origin(origin);
        if !secure {
            tracing::warn!(origin, "insecure origin; camera capture disabled");
        }
        Self { inner, secure }
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D: MediaDevices> MediaDevices for SecureContext<D> {
    type Stream = D::Stream;

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Self::Stream, MediaError> {
        if !self.secure {
            return Err(MediaError::InsecureContext);
        }
        self.inner.get_user_media(constraints).await
    }
}
