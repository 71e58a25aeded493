//! In-memory camera for tests and headless runs.

use crate::frame::Frame;
use crate::media::{MediaConstraints, MediaDevices, MediaError, MediaStream, ReadyState};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Hands out [`FakeStream`]s producing solid frames.
#[derive(Clone)]
pub struct FakeDevices {
    width: u32,
    height: u32,
    initial_ready: ReadyState,
    failure: Arc<Mutex<Option<MediaError>>>,
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl Default for FakeDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDevices {
    pub fn new() -> Self {
        Self {
            width: 64,
            height: 48,
            initial_ready: ReadyState::HaveEnoughData,
            failure: Arc::new(Mutex::new(None)),
            opened: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Readiness of streams opened from now on.
    pub fn with_ready_state(mut self, state: ReadyState) -> Self {
        self.initial_ready = state;
        self
    }

    /// Make the next `get_user_media` fail.
    pub fn fail_next(&self, error: MediaError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Streams opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Live tracks across every stream handed out.
    pub fn live_tracks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    type Stream = FakeStream;

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<FakeStream, MediaError> {
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(err);
        }
        if constraints.audio {
            return Err(MediaError::Overconstrained("audio".into()));
        }
        let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(FakeStream {
            id: format!("fake-{n}"),
            width: self.width,
            height: self.height,
            ready: Arc::new(AtomicU8::new(self.initial_ready as u8)),
            live: AtomicBool::new(true),
            total_live: Arc::clone(&self.live),
            sequence: AtomicUsize::new(0),
        })
    }
}

pub struct FakeStream {
    id: String,
    width: u32,
    height: u32,
    ready: Arc<AtomicU8>,
    live: AtomicBool,
    total_live: Arc<AtomicUsize>,
    sequence: AtomicUsize,
}

impl FakeStream {
    /// Handle for changing readiness after the stream was handed out.
    pub fn ready_handle(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.ready)
    }

    /// Simulate the device going away under a live stream.
    pub fn end(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.total_live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.live.load(Ordering::SeqCst))
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::SeqCst))
    }

    fn video_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn grab_frame(&self) -> Result<Frame, MediaError> {
        if !self.live.load(Ordering::SeqCst) {
            return Err(MediaError::Ended);
        }
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) as u32;
        let len = (self.width as usize) * (self.height as usize) * 3;
        Ok(Frame::new(vec![128; len], self.width, self.height, seq))
    }

    async fn stop(&mut self) {
        self.end();
    }
}
