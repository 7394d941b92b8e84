//! Local media capture.
//!
//! A [`MediaSource`] turns [`MediaStreamConstraints`] into a [`MediaStream`]
//! through a platform [`CaptureDevice`]. Streams are plain values; attaching
//! one to several peer connections shares a copy of the same track list.

pub(crate) mod source;
pub(crate) mod track;
pub(crate) mod track_state;

pub use source::{
    CaptureDevice, MediaSource, MediaStreamConstraints, StaticCaptureDevice, create_object_url,
};
pub use track::{MediaStreamTrack, MediaStreamTrackId, MediaStreamTrackKind};
pub use track_state::MediaStreamTrackState;

////////////////////////////////////////////////////////////////////////////////////////////////////
/// <https://www.w3.org/TR/mediacapture-streams/#stream-api>
////////////////////////////////////////////////////////////////////////////////////////////////////
pub type MediaStreamId = String;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    stream_id: MediaStreamId,
    tracks: Vec<MediaStreamTrack>,
}

impl MediaStream {
    pub fn new(stream_id: MediaStreamId, tracks: Vec<MediaStreamTrack>) -> Self {
        Self { stream_id, tracks }
    }

    pub fn stream_id(&self) -> &MediaStreamId {
        &self.stream_id
    }

    /// A stream is active while at least one of its tracks is live.
    pub fn active(&self) -> bool {
        self.tracks
            .iter()
            .any(|track| track.ready_state() == MediaStreamTrackState::Live)
    }

    pub fn get_audio_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks
            .iter()
            .filter(|track| track.kind() == MediaStreamTrackKind::Audio)
    }

    pub fn get_video_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks
            .iter()
            .filter(|track| track.kind() == MediaStreamTrackKind::Video)
    }

    pub fn get_tracks(&self) -> impl Iterator<Item = &MediaStreamTrack> {
        self.tracks.iter()
    }

    pub fn get_track_by_id(&self, track_id: &str) -> Option<&MediaStreamTrack> {
        self.tracks.iter().find(|track| track.id() == track_id)
    }

    /// Stops every track of this copy of the stream.
    pub fn stop(&mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
    }
}
