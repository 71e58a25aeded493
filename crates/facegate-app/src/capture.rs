//! Camera capture state machine.
//!
//! One controller per capture panel. All three panels share this code and
//! differ only in their [`CaptureContext`].

use facegate_client::{ApiError, FilePart};
use facegate_core::view::targets;
use facegate_hw::frame::JPEG_QUALITY;
use facegate_hw::{FrameError, MediaConstraints, MediaDevices, MediaError, MediaStream, ReadyState};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Which panel a controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureContext {
    /// Photo upload for the selected user.
    Enrollment,
    /// 1:N face prediction.
    Prediction,
    /// 1:1 verification against a claimed user.
    Verification,
}

impl CaptureContext {
    pub const ALL: [CaptureContext; 3] = [
        CaptureContext::Enrollment,
        CaptureContext::Prediction,
        CaptureContext::Verification,
    ];

    pub fn message_target(self) -> &'static str {
        match self {
            CaptureContext::Enrollment => targets::CAMERA_UPLOAD_MESSAGE,
            CaptureContext::Prediction => targets::PREDICT_MESSAGE,
            CaptureContext::Verification => targets::VERIFY_MESSAGE,
        }
    }

    pub fn preview_target(self) -> &'static str {
        match self {
            CaptureContext::Enrollment => targets::CAMERA_PREVIEW,
            CaptureContext::Prediction => targets::PREDICT_CAMERA_PREVIEW,
            CaptureContext::Verification => targets::VERIFY_CAMERA_PREVIEW,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CaptureContext::Enrollment => "enrollment",
            CaptureContext::Prediction => "prediction",
            CaptureContext::Verification => "verification",
        }
    }
}

impl std::fmt::Display for CaptureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Closed,
    Streaming,
    Captured,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("camera is not started")]
    NotStreaming,
    #[error("camera is not ready yet ({0:?})")]
    NotReady(ReadyState),
    #[error("a photo is already captured")]
    AlreadyCaptured,
    #[error("no photo captured yet")]
    NothingCaptured,
    #[error("captured frame is empty")]
    ZeroArea,
    #[error("could not encode captured frame: {0}")]
    Encode(#[from] FrameError),
    #[error(transparent)]
    Upload(#[from] ApiError),
}

impl CaptureError {
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::Media(e) => e.user_message(),
            CaptureError::Upload(e) => e.user_message(),
            CaptureError::NotStreaming => "❌ Please start the camera first".to_string(),
            CaptureError::NotReady(_) => {
                "❌ Camera is still starting, try again in a moment".to_string()
            }
            CaptureError::AlreadyCaptured => "❌ Retake before capturing again".to_string(),
            CaptureError::NothingCaptured => "❌ No photo captured yet".to_string(),
            other => format!("❌ {other}"),
        }
    }
}

/// An encoded snapshot waiting to be submitted.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub jpeg: Arc<[u8]>,
    /// PNG `data:` URL for the preview.
    pub data_url: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

impl CapturedImage {
    /// The JPEG as a multipart file field.
    pub fn file_part(&self) -> FilePart {
        FilePart::new("file", self.filename.clone(), "image/jpeg", Arc::clone(&self.jpeg))
    }
}

pub struct CaptureController<D: MediaDevices> {
    context: CaptureContext,
    devices: Arc<D>,
    constraints: MediaConstraints,
    stream: Option<D::Stream>,
    captured: Option<CapturedImage>,
}

impl<D: MediaDevices> CaptureController<D> {
    pub fn new(context: CaptureContext, devices: Arc<D>, constraints: MediaConstraints) -> Self {
        Self {
            context,
            devices,
            constraints,
            stream: None,
            captured: None,
        }
    }

    pub fn context(&self) -> CaptureContext {
        self.context
    }

    pub fn state(&self) -> CaptureState {
        match (&self.stream, &self.captured) {
            (None, _) => CaptureState::Closed,
            (Some(_), None) => CaptureState::Streaming,
            (Some(_), Some(_)) => CaptureState::Captured,
        }
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        self.captured.as_ref()
    }

    /// Live tracks on the held stream (zero when closed).
    pub fn live_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.live_tracks())
    }

    /// Acquire a stream. Any stream already held is stopped first.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        self.stop().await;
        match self.devices.get_user_media(&self.constraints).await {
            Ok(stream) => {
                let (width, height) = stream.video_size();
                tracing::info!(context = %self.context, stream = stream.id(), width, height, "camera started");
                self.stream = Some(stream);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(context = %self.context, error = %e, "camera start failed");
                Err(e.into())
            }
        }
    }

    /// Snapshot the current frame as JPEG plus a PNG preview.
    pub async fn capture(&mut self) -> Result<&CapturedImage, CaptureError> {
        let stream = self.stream.as_ref().ok_or(CaptureError::NotStreaming)?;
        if self.captured.is_some() {
            return Err(CaptureError::AlreadyCaptured);
        }
        if stream.live_tracks() == 0 {
            return Err(MediaError::Ended.into());
        }
        let ready = stream.ready_state();
        if ready < ReadyState::HaveCurrentData {
            tracing::debug!(context = %self.context, ?ready, "capture before data is buffered");
            return Err(CaptureError::NotReady(ready));
        }

        let frame = stream.grab_frame().await?;
        if frame.is_zero_area() {
            return Err(CaptureError::ZeroArea);
        }

        let (width, height) = (frame.width, frame.height);
        let (jpeg, data_url) = tokio::task::spawn_blocking(move || {
            Ok::<_, FrameError>((frame.to_jpeg(JPEG_QUALITY)?, frame.to_png_data_url()?))
        })
        .await
        .map_err(|e| FrameError::Encode(e.to_string()))??;

        let filename = format!("camera_{}.jpg", chrono::Utc::now().timestamp_millis());
        tracing::info!(context = %self.context, %filename, width, height, bytes = jpeg.len(), "frame captured");

        Ok(&*self.captured.insert(CapturedImage {
            jpeg: jpeg.into(),
            data_url,
            filename,
            width,
            height,
        }))
    }

    /// Discard the captured frame and keep streaming.
    pub fn retake(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_none() {
            return Err(CaptureError::NotStreaming);
        }
        self.captured
            .take()
            .map(|_| ())
            .ok_or(CaptureError::NothingCaptured)
    }

    /// Stop every track and discard any captured frame.
    pub async fn stop(&mut self) {
        self.captured = None;
        if let Some(mut stream) = self.stream.take() {
            stream.stop().await;
            tracing::info!(context = %self.context, stream = stream.id(), "camera stopped");
        }
    }

    /// Hand the captured JPEG to `upload`.
    ///
    /// On success the stream is released and the controller is closed; on
    /// failure the frame is kept so the submission can be retried.
    pub async fn submit<T, F, Fut>(&mut self, upload: F) -> Result<T, CaptureError>
    where
        F: FnOnce(FilePart) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let part = self
            .captured
            .as_ref()
            .ok_or(CaptureError::NothingCaptured)?
            .file_part();
        match upload(part).await {
            Ok(value) => {
                self.stop().await;
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(context = %self.context, error = %e, "capture submission failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_client::TransportError;
    use facegate_hw::mock::FakeDevices;
    use std::sync::atomic::Ordering;

    fn controller(devices: &FakeDevices) -> CaptureController<FakeDevices> {
        CaptureController::new(
            CaptureContext::Prediction,
            Arc::new(devices.clone()),
            MediaConstraints::default(),
        )
    }

    #[tokio::test]
    async fn test_stop_leaves_zero_live_tracks() {
        let devices = FakeDevices::new();
        let mut c = controller(&devices);
        c.start().await.unwrap();
        assert_eq!(c.live_tracks(), 1);
        c.stop().await;
        assert_eq!(c.state(), CaptureState::Closed);
        assert_eq!(c.live_tracks(), 0);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_restart_stops_previous_stream() {
        let devices = FakeDevices::new();
        let mut c = controller(&devices);
        c.start().await.unwrap();
        c.start().await.unwrap();
        assert_eq!(devices.opened(), 2);
        assert_eq!(devices.live_tracks(), 1);
    }

    #[tokio::test]
    async fn test_capture_before_data_rejected() {
        let devices = FakeDevices::new().with_ready_state(ReadyState::HaveMetadata);
        let mut c = controller(&devices);
        c.start().await.unwrap();
        let err = c.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::NotReady(ReadyState::HaveMetadata)));
        assert_eq!(c.state(), CaptureState::Streaming);
    }

    #[tokio::test]
    async fn test_capture_after_data_arrives() {
        let devices = FakeDevices::new().with_ready_state(ReadyState::HaveNothing);
        let mut c = controller(&devices);
        c.start().await.unwrap();
        assert!(c.capture().await.is_err());

        let ready = c.stream.as_ref().unwrap().ready_handle();
        ready.store(ReadyState::HaveCurrentData as u8, Ordering::SeqCst);
        let image = c.capture().await.unwrap();
        assert!(image.filename.starts_with("camera_"));
        assert!(image.filename.ends_with(".jpg"));
        assert!(image.data_url.starts_with("data:image/png;base64,"));
        assert_eq!(&image.jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(c.state(), CaptureState::Captured);
    }

    #[tokio::test]
    async fn test_zero_area_rejected() {
        let devices = FakeDevices::new().with_size(0, 0);
        let mut c = controller(&devices);
        c.start().await.unwrap();
        assert!(matches!(c.capture().await, Err(CaptureError::ZeroArea)));
        assert_eq!(c.state(), CaptureState::Streaming);
    }

    #[tokio::test]
    async fn test_retake_keeps_stream() {
        let devices = FakeDevices::new();
        let mut c = controller(&devices);
        c.start().await.unwrap();
        c.capture().await.unwrap();
        c.retake().unwrap();
        assert_eq!(c.state(), CaptureState::Streaming);
        assert_eq!(devices.opened(), 1);
        assert!(matches!(c.retake(), Err(CaptureError::NothingCaptured)));
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_frame() {
        let devices = FakeDevices::new();
        let mut c = controller(&devices);
        c.start().await.unwrap();
        c.capture().await.unwrap();

        let err = c
            .submit(|_| async { Err::<(), _>(ApiError::Transport(TransportError("offline".into()))) })
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Error: offline");
        assert_eq!(c.state(), CaptureState::Captured);

        let field = c
            .submit(|part| async move { Ok(part.field) })
            .await
            .unwrap();
        assert_eq!(field, "file");
        assert_eq!(c.state(), CaptureState::Closed);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_start_failure_stays_closed() {
        let devices = FakeDevices::new();
        devices.fail_next(MediaError::PermissionDenied("denied".into()));
        let mut c = controller(&devices);
        let err = c.start().await.unwrap_err();
        assert_eq!(err.user_message(), "❌ Camera Error: Camera permission denied");
        assert_eq!(c.state(), CaptureState::Closed);
    }

    #[tokio::test]
    async fn test_busy_device_stays_closed() {
        let devices = FakeDevices::new();
        devices.fail_next(MediaError::Busy);
        let mut c = controller(&devices);
        let err = c.start().await.unwrap_err();
        assert!(matches!(err, CaptureError::Media(MediaError::Busy)));
        assert_eq!(
            err.user_message(),
            "❌ Camera Error: Camera is already in use by another application"
        );
        assert_eq!(c.state(), CaptureState::Closed);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_ended_stream_reports_stopped() {
        let devices = FakeDevices::new();
        let mut c = controller(&devices);
        c.start().await.unwrap();
        c.stream.as_ref().unwrap().end();
        let err = c.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Media(MediaError::Ended)));
        assert_eq!(err.user_message(), "❌ Camera Error: Camera stream has stopped");
        c.stop().await;
        assert_eq!(c.state(), CaptureState::Closed);
        assert_eq!(devices.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_submit_without_capture() {
        let devices = FakeDevices::new();
        let mut c = controller(&devices);
        c.start().await.unwrap();
        let err = c.submit(|_| async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, CaptureError::NothingCaptured));
        assert_eq!(c.state(), CaptureState::Streaming);
    }
}
