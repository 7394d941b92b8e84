use std::fmt;

use super::track_state::MediaStreamTrackState;

pub type MediaStreamTrackId = String;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MediaStreamTrackKind {
    #[default]
    Audio,
    Video,
}

impl fmt::Display for MediaStreamTrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaStreamTrackKind::Audio => "audio",
            MediaStreamTrackKind::Video => "video",
        };
        write!(f, "{s}")
    }
}

/// A single audio or video capture track.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MediaStreamTrack {
    id: MediaStreamTrackId,
    kind: MediaStreamTrackKind,
    label: String,
    enabled: bool,
    ready_state: MediaStreamTrackState,
}

impl MediaStreamTrack {
    pub fn new(id: MediaStreamTrackId, kind: MediaStreamTrackKind, label: String) -> Self {
        Self {
            id,
            kind,
            label,
            enabled: true,
            ready_state: MediaStreamTrackState::Live,
        }
    }

    pub fn id(&self) -> &MediaStreamTrackId {
        &self.id
    }

    pub fn kind(&self) -> MediaStreamTrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn ready_state(&self) -> MediaStreamTrackState {
        self.ready_state
    }

    /// Ends the track permanently.
    pub fn stop(&mut self) {
        self.ready_state = MediaStreamTrackState::Ended;
    }
}
