use std::fmt;

use crate::error::{Error, Result};
use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::peer_connection::sdp::RTCSdpType;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StateChangeOp {
    #[default]
    SetLocal,
    SetRemote,
}

impl fmt::Display for StateChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StateChangeOp::SetLocal => write!(f, "SetLocal"),
            StateChangeOp::SetRemote => write!(f, "SetRemote"),
        }
    }
}

/// Indicates the state of the SDP offer/answer exchange, as defined by the
/// W3C `RTCSignalingState`.
///
/// ```text
/// offerer:  Stable -> HaveLocalOffer -> (HaveRemotePranswer) -> Stable
/// answerer: Stable -> HaveRemoteOffer -> (HaveLocalPranswer) -> Stable
/// ```
///
/// [W3C RTCPeerConnection.signalingState]: https://w3c.github.io/webrtc-pc/#dom-peerconnection-signaling-state
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCSignalingState {
    Unspecified = 0,

    /// No offer/answer exchange is in progress.
    #[default]
    Stable,

    /// A local offer has been applied.
    HaveLocalOffer,

    /// A remote offer has been applied.
    HaveRemoteOffer,

    /// A remote offer and a local provisional answer have been applied.
    HaveLocalPranswer,

    /// A local offer and a remote provisional answer have been applied.
    HaveRemotePranswer,

    Closed,
}

const SIGNALING_STATE_STABLE_STR: &str = "stable";
const SIGNALING_STATE_HAVE_LOCAL_OFFER_STR: &str = "have-local-offer";
const SIGNALING_STATE_HAVE_REMOTE_OFFER_STR: &str = "have-remote-offer";
const SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR: &str = "have-local-pranswer";
const SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR: &str = "have-remote-pranswer";
const SIGNALING_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCSignalingState {
    fn from(raw: &str) -> Self {
        match raw {
            SIGNALING_STATE_STABLE_STR => RTCSignalingState::Stable,
            SIGNALING_STATE_HAVE_LOCAL_OFFER_STR => RTCSignalingState::HaveLocalOffer,
            SIGNALING_STATE_HAVE_REMOTE_OFFER_STR => RTCSignalingState::HaveRemoteOffer,
            SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR => RTCSignalingState::HaveLocalPranswer,
            SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR => RTCSignalingState::HaveRemotePranswer,
            SIGNALING_STATE_CLOSED_STR => RTCSignalingState::Closed,
            _ => RTCSignalingState::Unspecified,
        }
    }
}

impl fmt::Display for RTCSignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCSignalingState::Stable => SIGNALING_STATE_STABLE_STR,
            RTCSignalingState::HaveLocalOffer => SIGNALING_STATE_HAVE_LOCAL_OFFER_STR,
            RTCSignalingState::HaveRemoteOffer => SIGNALING_STATE_HAVE_REMOTE_OFFER_STR,
            RTCSignalingState::HaveLocalPranswer => SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR,
            RTCSignalingState::HaveRemotePranswer => SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR,
            RTCSignalingState::Closed => SIGNALING_STATE_CLOSED_STR,
            RTCSignalingState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// The signaling state a successful description application would lead to.
pub(crate) fn proposed_signaling_state(
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> RTCSignalingState {
    match (op, sdp_type) {
        (StateChangeOp::SetLocal, RTCSdpType::Offer) => RTCSignalingState::HaveLocalOffer,
        (StateChangeOp::SetRemote, RTCSdpType::Offer) => RTCSignalingState::HaveRemoteOffer,
        (StateChangeOp::SetLocal, RTCSdpType::Pranswer) => RTCSignalingState::HaveLocalPranswer,
        (StateChangeOp::SetRemote, RTCSdpType::Pranswer) => RTCSignalingState::HaveRemotePranswer,
        (_, RTCSdpType::Answer) => RTCSignalingState::Stable,
        _ => RTCSignalingState::Unspecified,
    }
}

pub(crate) fn check_next_signaling_state(
    cur: RTCSignalingState,
    next: RTCSignalingState,
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> Result<RTCSignalingState> {
    // Special case for rollbacks
    if sdp_type == RTCSdpType::Rollback && cur == RTCSignalingState::Stable {
        return Err(Error::ErrSignalingStateCannotRollback);
    }

    let valid = match (cur, op, sdp_type, next) {
        // stable->SetLocal(offer)->have-local-offer
        (
            RTCSignalingState::Stable,
            StateChangeOp::SetLocal,
            RTCSdpType::Offer,
            RTCSignalingState::HaveLocalOffer,
        )
        // stable->SetRemote(offer)->have-remote-offer
        | (
            RTCSignalingState::Stable,
            StateChangeOp::SetRemote,
            RTCSdpType::Offer,
            RTCSignalingState::HaveRemoteOffer,
        )
        // have-local-offer->SetRemote(answer)->stable
        | (
            RTCSignalingState::HaveLocalOffer,
            StateChangeOp::SetRemote,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        )
        // have-local-offer->SetRemote(pranswer)->have-remote-pranswer
        | (
            RTCSignalingState::HaveLocalOffer,
            StateChangeOp::SetRemote,
            RTCSdpType::Pranswer,
            RTCSignalingState::HaveRemotePranswer,
        )
        // have-remote-pranswer->SetRemote(answer)->stable
        | (
            RTCSignalingState::HaveRemotePranswer,
            StateChangeOp::SetRemote,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        )
        // have-remote-offer->SetLocal(answer)->stable
        | (
            RTCSignalingState::HaveRemoteOffer,
            StateChangeOp::SetLocal,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        )
        // have-remote-offer->SetLocal(pranswer)->have-local-pranswer
        | (
            RTCSignalingState::HaveRemoteOffer,
            StateChangeOp::SetLocal,
            RTCSdpType::Pranswer,
            RTCSignalingState::HaveLocalPranswer,
        )
        // have-local-pranswer->SetLocal(answer)->stable
        | (
            RTCSignalingState::HaveLocalPranswer,
            StateChangeOp::SetLocal,
            RTCSdpType::Answer,
            RTCSignalingState::Stable,
        ) => true,
        _ => false,
    };

    if valid {
        Ok(next)
    } else {
        Err(Error::ErrSignalingStateProposedTransitionInvalid(format!(
            "from {cur} applying {op} {sdp_type}"
        )))
    }
}
