//! facegate-client — HTTP client for the face-recognition backend.
//!
//! [`ApiClient`] wraps a [`Transport`]: [`HttpTransport`] talks to a real
//! server via reqwest, [`mock::ScriptedTransport`] replays canned responses.

pub mod api;
pub mod mock;
pub mod transport;

pub use api::{ApiClient, ApiError};
pub use transport::{FilePart, HttpTransport, Transport, TransportError};
