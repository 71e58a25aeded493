//! facegate-app — Interaction layer for the face-recognition console.
//!
//! A [`PageSession`] owns all interaction state (selected user, file
//! selections, camera controllers, tab state) and exposes one async
//! handler per operator action. Handlers return [`Update`]s describing
//! what to render; they never fail outward.

pub mod capture;
pub mod config;
pub mod handlers;
pub mod session;

pub use capture::{CaptureContext, CaptureController, CaptureError, CaptureState};
pub use config::{Config, ConfigError};
pub use handlers::Submission;
pub use session::{PageSession, Update};
