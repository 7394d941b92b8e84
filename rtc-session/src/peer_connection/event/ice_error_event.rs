use crate::peer_connection::transport::RTCIceCandidateInit;

/// Raised when a remote candidate handed to `add_ice_candidate` could not be
/// parsed or applied.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct RTCPeerConnectionIceErrorEvent {
    pub candidate: RTCIceCandidateInit,
    pub error_text: String,
}
