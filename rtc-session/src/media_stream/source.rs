use std::sync::Arc;

use log::{debug, warn};

use super::track::{MediaStreamTrack, MediaStreamTrackKind};
use super::MediaStream;
use crate::error::{Error, Result};
use crate::util::math_rand_alpha_number;

const STREAM_ID_LEN: usize = 16;
const OBJECT_URL_PREFIX: &str = "blob:rtc-session/";

/// Requested capture capabilities.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct MediaStreamConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaStreamConstraints {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.audio && !self.video {
            return Err(Error::ErrInvalidConstraints);
        }
        Ok(())
    }
}

/// The platform capture boundary.
///
/// `request_capture` may block for a long time, e.g. while a permission
/// prompt is shown, so [`MediaSource`] always calls it from a blocking
/// worker thread.
pub trait CaptureDevice: Send + Sync {
    fn request_capture(&self, constraints: &MediaStreamConstraints) -> Result<MediaStream>;
}

/// An in-memory capture device with fixed capabilities.
#[derive(Debug, Clone)]
pub struct StaticCaptureDevice {
    pub has_audio: bool,
    pub has_video: bool,
    pub permission_granted: bool,
}

impl Default for StaticCaptureDevice {
    fn default() -> Self {
        StaticCaptureDevice {
            has_audio: true,
            has_video: true,
            permission_granted: true,
        }
    }
}

impl CaptureDevice for StaticCaptureDevice {
    fn request_capture(&self, constraints: &MediaStreamConstraints) -> Result<MediaStream> {
        if !self.permission_granted {
            return Err(Error::ErrPermissionDenied);
        }
        if constraints.audio && !self.has_audio {
            return Err(Error::ErrDeviceUnavailable(MediaStreamTrackKind::Audio.to_string()));
        }
        if constraints.video && !self.has_video {
            return Err(Error::ErrDeviceUnavailable(MediaStreamTrackKind::Video.to_string()));
        }

        let mut tracks = vec![];
        if constraints.audio {
            tracks.push(MediaStreamTrack::new(
                math_rand_alpha_number(STREAM_ID_LEN),
                MediaStreamTrackKind::Audio,
                "static microphone".to_owned(),
            ));
        }
        if constraints.video {
            tracks.push(MediaStreamTrack::new(
                math_rand_alpha_number(STREAM_ID_LEN),
                MediaStreamTrackKind::Video,
                "static camera".to_owned(),
            ));
        }

        Ok(MediaStream::new(math_rand_alpha_number(STREAM_ID_LEN), tracks))
    }
}

/// Acquires local capture streams.
#[derive(Clone)]
pub struct MediaSource {
    device: Arc<dyn CaptureDevice>,
}

impl MediaSource {
    pub fn new(device: Arc<dyn CaptureDevice>) -> Self {
        MediaSource { device }
    }

    /// Asks the platform for a stream matching `constraints`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn acquire(&self, constraints: MediaStreamConstraints) -> Result<MediaStream> {
        constraints.validate()?;

        let device = Arc::clone(&self.device);
        let stream = tokio::task::spawn_blocking(move || device.request_capture(&constraints))
            .await
            .map_err(|e| Error::Other(e.to_string()))?;

        match &stream {
            Ok(stream) => debug!(
                "acquired stream {} with {} track(s)",
                stream.stream_id(),
                stream.get_tracks().count()
            ),
            Err(err) => warn!("capture request failed: {err}"),
        }
        stream
    }
}

/// Returns a display-only reference to `stream`. It has no meaning to the
/// negotiation protocol.
pub fn create_object_url(stream: &MediaStream) -> String {
    format!("{OBJECT_URL_PREFIX}{}", stream.stream_id())
}
