use std::fmt;

use crate::peer_connection::configuration::UNSPECIFIED_STR;

/// DataChannelState indicates the state of a data channel.
///
/// States only move forward: `connecting -> open -> closing -> closed`,
/// with `connecting` or `open` allowed to jump straight to `closed`.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCDataChannelState {
    Unspecified,

    /// The channel was announced but the transport has not reported it ready.
    #[default]
    Connecting,

    /// Messages can be sent and received.
    Open,

    /// Close was requested; waiting for the transport to confirm.
    Closing,

    /// Terminal.
    Closed,
}

const DATA_CHANNEL_STATE_CONNECTING_STR: &str = "connecting";
const DATA_CHANNEL_STATE_OPEN_STR: &str = "open";
const DATA_CHANNEL_STATE_CLOSING_STR: &str = "closing";
const DATA_CHANNEL_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCDataChannelState {
    fn from(raw: &str) -> Self {
        match raw {
            DATA_CHANNEL_STATE_CONNECTING_STR => RTCDataChannelState::Connecting,
            DATA_CHANNEL_STATE_OPEN_STR => RTCDataChannelState::Open,
            DATA_CHANNEL_STATE_CLOSING_STR => RTCDataChannelState::Closing,
            DATA_CHANNEL_STATE_CLOSED_STR => RTCDataChannelState::Closed,
            _ => RTCDataChannelState::Unspecified,
        }
    }
}

impl fmt::Display for RTCDataChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCDataChannelState::Connecting => DATA_CHANNEL_STATE_CONNECTING_STR,
            RTCDataChannelState::Open => DATA_CHANNEL_STATE_OPEN_STR,
            RTCDataChannelState::Closing => DATA_CHANNEL_STATE_CLOSING_STR,
            RTCDataChannelState::Closed => DATA_CHANNEL_STATE_CLOSED_STR,
            RTCDataChannelState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCDataChannelState {
    fn rank(self) -> u8 {
        match self {
            RTCDataChannelState::Unspecified => 0,
            RTCDataChannelState::Connecting => 1,
            RTCDataChannelState::Open => 2,
            RTCDataChannelState::Closing => 3,
            RTCDataChannelState::Closed => 4,
        }
    }

    /// Reports whether moving to `next` is a forward transition.
    pub fn can_transition_to(self, next: RTCDataChannelState) -> bool {
        next != RTCDataChannelState::Unspecified && next.rank() > self.rank()
    }
}
