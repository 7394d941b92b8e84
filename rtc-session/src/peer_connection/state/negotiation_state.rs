use std::fmt;

use crate::error::{Error, Result};
use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::peer_connection::sdp::RTCSdpType;

/// Progress of a connection through one offer/answer round.
///
/// ```text
/// offerer:  Idle -> OfferCreated -> LocalDescriptionSet -> Negotiated
/// answerer: Idle -> RemoteDescriptionSet -> AnswerCreated -> Negotiated
/// ```
///
/// Unlike [`RTCSignalingState`](super::RTCSignalingState) this also records
/// whether an offer or answer has been generated but not yet applied, which
/// is what decides the validity of `create_offer` and `create_answer`.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCNegotiationState {
    Unspecified,

    /// Nothing has been generated or applied yet.
    #[default]
    Idle,

    /// An offer was generated and not yet applied locally.
    OfferCreated,

    /// An answer was generated for the applied remote offer.
    AnswerCreated,

    /// The local offer was applied; waiting for the remote answer.
    LocalDescriptionSet,

    /// The remote offer was applied; an answer is due.
    RemoteDescriptionSet,

    /// Both sides applied a final description.
    Negotiated,

    Closed,
}

const NEGOTIATION_STATE_IDLE_STR: &str = "idle";
const NEGOTIATION_STATE_OFFER_CREATED_STR: &str = "offer-created";
const NEGOTIATION_STATE_ANSWER_CREATED_STR: &str = "answer-created";
const NEGOTIATION_STATE_LOCAL_DESCRIPTION_SET_STR: &str = "local-description-set";
const NEGOTIATION_STATE_REMOTE_DESCRIPTION_SET_STR: &str = "remote-description-set";
const NEGOTIATION_STATE_NEGOTIATED_STR: &str = "negotiated";
const NEGOTIATION_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCNegotiationState {
    fn from(raw: &str) -> Self {
        match raw {
            NEGOTIATION_STATE_IDLE_STR => RTCNegotiationState::Idle,
            NEGOTIATION_STATE_OFFER_CREATED_STR => RTCNegotiationState::OfferCreated,
            NEGOTIATION_STATE_ANSWER_CREATED_STR => RTCNegotiationState::AnswerCreated,
            NEGOTIATION_STATE_LOCAL_DESCRIPTION_SET_STR => {
                RTCNegotiationState::LocalDescriptionSet
            }
            NEGOTIATION_STATE_REMOTE_DESCRIPTION_SET_STR => {
                RTCNegotiationState::RemoteDescriptionSet
            }
            NEGOTIATION_STATE_NEGOTIATED_STR => RTCNegotiationState::Negotiated,
            NEGOTIATION_STATE_CLOSED_STR => RTCNegotiationState::Closed,
            _ => RTCNegotiationState::Unspecified,
        }
    }
}

impl fmt::Display for RTCNegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCNegotiationState::Idle => NEGOTIATION_STATE_IDLE_STR,
            RTCNegotiationState::OfferCreated => NEGOTIATION_STATE_OFFER_CREATED_STR,
            RTCNegotiationState::AnswerCreated => NEGOTIATION_STATE_ANSWER_CREATED_STR,
            RTCNegotiationState::LocalDescriptionSet => {
                NEGOTIATION_STATE_LOCAL_DESCRIPTION_SET_STR
            }
            RTCNegotiationState::RemoteDescriptionSet => {
                NEGOTIATION_STATE_REMOTE_DESCRIPTION_SET_STR
            }
            RTCNegotiationState::Negotiated => NEGOTIATION_STATE_NEGOTIATED_STR,
            RTCNegotiationState::Closed => NEGOTIATION_STATE_CLOSED_STR,
            RTCNegotiationState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum NegotiationOp {
    CreateOffer,
    CreateAnswer,
    SetLocal(RTCSdpType),
    SetRemote(RTCSdpType),
}

impl fmt::Display for NegotiationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            NegotiationOp::CreateOffer => write!(f, "create_offer"),
            NegotiationOp::CreateAnswer => write!(f, "create_answer"),
            NegotiationOp::SetLocal(sdp_type) => write!(f, "set_local_description({sdp_type})"),
            NegotiationOp::SetRemote(sdp_type) => {
                write!(f, "set_remote_description({sdp_type})")
            }
        }
    }
}

/// Validates `op` against the current state and returns the state a
/// successful completion moves to.
pub(crate) fn check_next_negotiation_state(
    cur: RTCNegotiationState,
    op: NegotiationOp,
) -> Result<RTCNegotiationState> {
    use RTCNegotiationState::*;

    if cur == Closed {
        return Err(Error::ErrConnectionClosed);
    }

    let next = match (cur, op) {
        (Idle, NegotiationOp::CreateOffer) => Some(OfferCreated),
        (RemoteDescriptionSet | AnswerCreated, NegotiationOp::CreateAnswer) => Some(AnswerCreated),
        (Idle | OfferCreated, NegotiationOp::SetLocal(RTCSdpType::Offer)) => {
            Some(LocalDescriptionSet)
        }
        (RemoteDescriptionSet | AnswerCreated, NegotiationOp::SetLocal(RTCSdpType::Answer)) => {
            Some(Negotiated)
        }
        // a provisional answer keeps the round open
        (RemoteDescriptionSet | AnswerCreated, NegotiationOp::SetLocal(RTCSdpType::Pranswer)) => {
            Some(cur)
        }
        (Idle, NegotiationOp::SetRemote(RTCSdpType::Offer)) => Some(RemoteDescriptionSet),
        (LocalDescriptionSet, NegotiationOp::SetRemote(RTCSdpType::Answer)) => Some(Negotiated),
        (LocalDescriptionSet, NegotiationOp::SetRemote(RTCSdpType::Pranswer)) => Some(cur),
        _ => None,
    };

    next.ok_or_else(|| Error::ErrInvalidState(format!("{op} is not valid in state {cur}")))
}
