//! facegate-core — Data model and presentation logic.
//!
//! Holds the wire types of the face-recognition backend, tab/section view
//! state, file previews, form validation and the pure renderers that turn
//! API payloads into [`render::View`]s.

pub mod form;
pub mod preview;
pub mod render;
pub mod types;
pub mod view;

pub use render::{Node, Notice, Tone, View};
pub use types::{
    FaceSession, NewUser, Photo, PredictionResult, TrainingParams, User, UserId,
    VerificationOutcome,
};
