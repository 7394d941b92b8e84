use crate::engine::RequestId;
use crate::error::Result;
use crate::media_stream::MediaStream;
use crate::peer_connection::sdp::RTCSessionDescription;
use crate::peer_connection::state::{
    RTCIceGatheringState, RTCNegotiationState, RTCPeerConnectionState, RTCSignalingState,
};

pub(crate) mod data_channel_event;
pub(crate) mod ice_error_event;
pub(crate) mod ice_event;

pub use data_channel_event::RTCDataChannelEvent;
pub use ice_error_event::RTCPeerConnectionIceErrorEvent;
pub use ice_event::RTCPeerConnectionIceEvent;

/// Everything a peer connection reports through `poll_event`.
///
/// The `On*Created`/`On*Set`/`OnIceCandidateAdded` variants complete the
/// request whose [`RequestId`] was returned when the operation was issued.
/// Every issued request is completed exactly once, with `Err(ErrConnectionClosed)`
/// if the connection closes first.
#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, PartialEq)]
pub enum RTCPeerConnectionEvent {
    OnOfferCreated(RequestId, Result<RTCSessionDescription>),
    OnAnswerCreated(RequestId, Result<RTCSessionDescription>),
    OnLocalDescriptionSet(RequestId, Result<()>),
    OnRemoteDescriptionSet(RequestId, Result<()>),
    OnIceCandidateAdded(RequestId, Result<()>),

    /// The local description of the current gathering pass is final. With
    /// the complete gathering policy it embeds every gathered candidate.
    /// Raised exactly once per pass.
    OnLocalDescriptionFinalized(Result<RTCSessionDescription>),

    /// A new gathering pass started for a local description handed to the
    /// engine. Any earlier finalization no longer describes the session.
    OnIceGatheringPassStarted,

    OnIceCandidateEvent(RTCPeerConnectionIceEvent),
    OnIceCandidateErrorEvent(RTCPeerConnectionIceErrorEvent),
    OnSignalingStateChangeEvent(RTCSignalingState),
    OnNegotiationStateChangeEvent(RTCNegotiationState),
    OnIceGatheringStateChangeEvent(RTCIceGatheringState),
    OnConnectionStateChangeEvent(RTCPeerConnectionState),

    OnDataChannel(RTCDataChannelEvent),

    /// The remote peer's media stream arrived. Raised once per stream id.
    OnRemoteStream(MediaStream),
}
