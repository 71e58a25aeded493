use crate::camera::{Camera, CameraError};
use crate::frame::Frame;
use crate::media::{MediaConstraints, MediaDevices, MediaError, MediaStream, ReadyState};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use v4l::prelude::MmapStream;

static STREAM_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Messages sent from stream handles to the capture thread.
enum StreamRequest {
    Grab {
        reply: oneshot::Sender<Result<Frame, CameraError>>,
    },
}

/// V4L2-backed media source for one device path.
#[derive(Debug, Clone)]
pub struct V4l2Devices {
    device_path: String,
    warmup_frames: usize,
}

impl V4l2Devices {
    pub fn new(device_path: impl Into<String>, warmup_frames: usize) -> Self {
        Self {
            device_path: device_path.into(),
            warmup_frames,
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl MediaDevices for V4l2Devices {
    type Stream = V4l2Stream;

    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<V4l2Stream, MediaError> {
        if constraints.audio {
            return Err(MediaError::Overconstrained("audio".into()));
        }
        let path = self.device_path.clone();
        let (width, height) = (constraints.ideal_width, constraints.ideal_height);
        let warmup = self.warmup_frames;
        tokio::task::spawn_blocking(move || {
            spawn_stream(Camera::open(&path, width, height)?, warmup)
        })
        .await
        .map_err(|e| MediaError::Other(format!("camera task failed: {e}")))?
        .map_err(MediaError::from)
    }
}

/// Handle to a live capture thread.
///
/// Frames are grabbed through a request channel; dropping the handle or
/// calling [`MediaStream::stop`] ends the thread and releases the device.
pub struct V4l2Stream {
    id: String,
    tx: Option<mpsc::Sender<StreamRequest>>,
    thread: Option<JoinHandle<()>>,
    live: Arc<AtomicBool>,
    ready: Arc<AtomicU8>,
    width: u32,
    height: u32,
}

/// A device the capture thread can stream from.
///
/// The stream is created on the capture thread and borrows the source for
/// as long as the thread runs.
pub(crate) trait CaptureSource: Send + 'static {
    type Stream<'a>
    where
        Self: 'a;

    fn describe(&self) -> &str;

    fn size(&self) -> (u32, u32);

    fn start(&self) -> Result<Self::Stream<'_>, CameraError>;

    fn next_frame(&self, stream: &mut Self::Stream<'_>) -> Result<Frame, CameraError>;
}

impl CaptureSource for Camera {
    type Stream<'a> = MmapStream<'a>;

    fn describe(&self) -> &str {
        &self.device_path
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn start(&self) -> Result<MmapStream<'_>, CameraError> {
        self.stream()
    }

    fn next_frame(&self, stream: &mut MmapStream<'_>) -> Result<Frame, CameraError> {
        self.read_frame(stream)
    }
}

/// Start the capture thread for an opened device.
///
/// Blocks until the thread has created its stream, so a device that opens
/// but refuses to stream (EBUSY on buffer setup) fails here. Warmup frames
/// are discarded on the thread; readiness climbs to
/// [`ReadyState::HaveEnoughData`] once they are through.
fn spawn_stream<S: CaptureSource>(
    source: S,
    warmup_frames: usize,
) -> Result<V4l2Stream, CameraError> {
    let (width, height) = source.size();
    let device = source.describe().to_string();

    let id = format!("v4l2-{}", STREAM_SEQ.fetch_add(1, Ordering::SeqCst) + 1);
    let live = Arc::new(AtomicBool::new(true));
    let ready = Arc::new(AtomicU8::new(ReadyState::HaveNothing as u8));
    let (tx, mut rx) = mpsc::channel::<StreamRequest>(4);
    let (started_tx, started_rx) = oneshot::channel::<Result<(), CameraError>>();

    let thread = {
        let live = Arc::clone(&live);
        let ready = Arc::clone(&ready);
        let id = id.clone();
        std::thread::Builder::new()
            .name(format!("facegate-{id}"))
            .spawn(move || {
                match source.start() {
                    Ok(mut stream) => {
                        ready.store(ReadyState::HaveMetadata as u8, Ordering::SeqCst);
                        let _ = started_tx.send(Ok(()));
                        run_capture(&source, &mut stream, &mut rx, &ready, warmup_frames);
                    }
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                    }
                }
                live.store(false, Ordering::SeqCst);
                tracing::info!(stream = %id, device = source.describe(), "capture thread exiting");
            })
            .map_err(|e| CameraError::CaptureFailed(format!("failed to spawn capture thread: {e}")))?
    };

    let started = started_rx.blocking_recv().unwrap_or_else(|_| {
        Err(CameraError::CaptureFailed(
            "capture thread exited during startup".into(),
        ))
    });
    if let Err(e) = started {
        if thread.join().is_err() {
            tracing::error!(stream = %id, "capture thread panicked");
        }
        tracing::warn!(stream = %id, device = %device, error = %e, "could not start capture stream");
        return Err(e);
    }

    tracing::info!(stream = %id, device = %device, width, height, "stream started");

    Ok(V4l2Stream {
        id,
        tx: Some(tx),
        thread: Some(thread),
        live,
        ready,
        width,
        height,
    })
}

fn run_capture<S: CaptureSource>(
    source: &S,
    stream: &mut S::Stream<'_>,
    rx: &mut mpsc::Receiver<StreamRequest>,
    ready: &AtomicU8,
    warmup_frames: usize,
) {
    // Discard warmup frames for camera AGC/AE stabilization
    for n in 0..warmup_frames.max(1) {
        match source.next_frame(stream) {
            Ok(_) => ready.store(ReadyState::HaveCurrentData as u8, Ordering::SeqCst),
            Err(e) => tracing::warn!(frame = n, error = %e, "warmup frame failed"),
        }
    }
    if ready.load(Ordering::SeqCst) >= ReadyState::HaveCurrentData as u8 {
        ready.store(ReadyState::HaveEnoughData as u8, Ordering::SeqCst);
    }

    while let Some(req) = rx.blocking_recv() {
        match req {
            StreamRequest::Grab { reply } => {
                let result = source.next_frame(stream);
                if let Err(e) = &result {
                    tracing::warn!(error = %e, "frame grab failed");
                }
                let _ = reply.send(result);
            }
        }
    }
}

#[async_trait]
impl MediaStream for V4l2Stream {
    fn id(&self) -> &str {
        &self.id
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.tx.is_some() && self.live.load(Ordering::SeqCst))
    }

    fn ready_state(&self) -> ReadyState {
        if !self.live.load(Ordering::SeqCst) {
            return ReadyState::HaveNothing;
        }
        ReadyState::from_u8(self.ready.load(Ordering::SeqCst))
    }

    fn video_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn grab_frame(&self) -> Result<Frame, MediaError> {
        let tx = self.tx.as_ref().ok_or(MediaError::Ended)?;
        if !self.live.load(Ordering::SeqCst) {
            return Err(MediaError::Ended);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(StreamRequest::Grab { reply: reply_tx })
            .await
            .map_err(|_| MediaError::Ended)?;
        reply_rx
            .await
            .map_err(|_| MediaError::Ended)?
            .map_err(MediaError::from)
    }

    async fn stop(&mut self) {
        // Closing the channel ends the capture loop.
        self.tx.take();
        self.live.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => tracing::info!(stream = %self.id, "stream stopped"),
                Ok(Err(_)) => tracing::error!(stream = %self.id, "capture thread panicked"),
                Err(e) => tracing::error!(stream = %self.id, error = %e, "join task failed"),
            }
        }
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        if self.tx.take().is_some() {
            tracing::debug!(stream = %self.id, "stream dropped without stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source whose stream setup fails, or whose frames run out.
    struct ScriptedSource {
        start_error: Option<fn() -> CameraError>,
        frames: std::sync::Mutex<usize>,
    }

    impl ScriptedSource {
        fn busy() -> Self {
            Self {
                start_error: Some(|| CameraError::DeviceBusy),
                frames: std::sync::Mutex::new(0),
            }
        }

        fn with_frames(frames: usize) -> Self {
            Self {
                start_error: None,
                frames: std::sync::Mutex::new(frames),
            }
        }
    }

    impl CaptureSource for ScriptedSource {
        type Stream<'a> = ();

        fn describe(&self) -> &str {
            "scripted"
        }

        fn size(&self) -> (u32, u32) {
            (4, 2)
        }

        fn start(&self) -> Result<(), CameraError> {
            match self.start_error {
                Some(err) => Err(err()),
                None => Ok(()),
            }
        }

        fn next_frame(&self, _stream: &mut ()) -> Result<Frame, CameraError> {
            let mut left = self.frames.lock().unwrap();
            if *left == 0 {
                return Err(CameraError::CaptureFailed("no more frames".into()));
            }
            *left -= 1;
            Ok(Frame::new(vec![0; 4 * 2 * 3], 4, 2, *left as u32))
        }
    }

    #[tokio::test]
    async fn test_busy_stream_setup_fails_start() {
        let err = tokio::task::spawn_blocking(|| spawn_stream(ScriptedSource::busy(), 0))
            .await
            .unwrap()
            .err();
        assert!(matches!(err, Some(CameraError::DeviceBusy)));
        assert_eq!(MediaError::from(CameraError::DeviceBusy), MediaError::Busy);
    }

    #[tokio::test]
    async fn test_stream_ready_after_warmup() {
        let mut stream =
            tokio::task::spawn_blocking(|| spawn_stream(ScriptedSource::with_frames(3), 2))
                .await
                .unwrap()
                .unwrap();
        assert_eq!(stream.live_tracks(), 1);
        assert_eq!(stream.video_size(), (4, 2));

        let frame = stream.grab_frame().await.unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(stream.ready_state(), ReadyState::HaveEnoughData);
        assert!(matches!(stream.grab_frame().await, Err(MediaError::Other(_))));

        stream.stop().await;
        assert_eq!(stream.live_tracks(), 0);
        assert!(matches!(stream.grab_frame().await, Err(MediaError::Ended)));
    }

    #[tokio::test]
    async fn test_exited_thread_reports_ended() {
        let stream = tokio::task::spawn_blocking(|| spawn_stream(ScriptedSource::with_frames(1), 1))
            .await
            .unwrap()
            .unwrap();
        stream.live.store(false, Ordering::SeqCst);
        assert_eq!(stream.live_tracks(), 0);
        assert_eq!(stream.ready_state(), ReadyState::HaveNothing);
        assert!(matches!(stream.grab_frame().await, Err(MediaError::Ended)));
    }

    #[tokio::test]
    async fn test_missing_device_maps_to_not_found() {
        let devices = V4l2Devices::new("/dev/facegate-missing", 0);
        let err = devices
            .get_user_media(&MediaConstraints::default())
            .await
            .err();
        assert!(matches!(err, Some(MediaError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_audio_is_overconstrained() {
        let devices = V4l2Devices::new("/dev/video0", 0);
        let constraints = MediaConstraints {
            audio: true,
            ..Default::default()
        };
        assert!(matches!(
            devices.get_user_media(&constraints).await,
            Err(MediaError::Overconstrained(_))
        ));
    }
}
