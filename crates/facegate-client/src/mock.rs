//! In-memory transport that replays scripted responses.
//!
//! Used by tests; every request is recorded for inspection.

use crate::transport::{ApiRequest, RawResponse, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a JSON response.
    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        lock(&self.responses).push_back(Ok(RawResponse {
            status,
            body: body.to_string().into_bytes(),
        }));
        self
    }

    /// Queue a response with an arbitrary body.
    pub fn push_raw(&self, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        lock(&self.responses).push_back(Ok(RawResponse {
            status,
            body: body.into(),
        }));
        self
    }

    /// Queue a failure to complete the request.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        lock(&self.responses).push_back(Err(TransportError(message.into())));
        self
    }

    /// Requests sent so far, oldest first.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        lock(&self.requests).push(request);
        lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted response".into())))
    }

    fn api_base(&self) -> &str {
        "/api"
    }
}
