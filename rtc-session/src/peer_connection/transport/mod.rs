//! ICE transport types exchanged through signaling.

pub(crate) mod ice_candidate;
pub(crate) mod ice_server;

pub use ice_candidate::{
    IntoIceCandidateInit, RTCIceCandidate, RTCIceCandidateInit, RTCIceCandidateType,
    RTCIceProtocol,
};
pub use ice_server::{RTCIceCredentialType, RTCIceServer};
