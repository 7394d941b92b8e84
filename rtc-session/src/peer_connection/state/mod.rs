//! Connection state types.
//!
//! A connection tracks several independent state machines:
//!
//! - **[`RTCNegotiationState`]** - progress through one offer/answer round
//! - **[`RTCSignalingState`]** - the W3C view of the same exchange (stable, have-local-offer, ...)
//! - **[`RTCIceGatheringState`]** - progress of the current candidate gathering pass
//! - **[`RTCPeerConnectionState`]** - transport session state as reported by the engine
//!
//! Every change is surfaced as an
//! [`RTCPeerConnectionEvent`](crate::peer_connection::event::RTCPeerConnectionEvent).
//!
//! ```
//! use rtc_session::peer_connection::state::{RTCNegotiationState, RTCSignalingState};
//!
//! let state: RTCSignalingState = "have-local-offer".into();
//! assert_eq!(state, RTCSignalingState::HaveLocalOffer);
//! assert_eq!(RTCNegotiationState::default().to_string(), "idle");
//! ```

pub(crate) mod ice_gathering_state;
pub(crate) mod negotiation_state;
pub(crate) mod peer_connection_state;
pub(crate) mod signaling_state;

pub use ice_gathering_state::RTCIceGatheringState;
pub use negotiation_state::RTCNegotiationState;
pub use peer_connection_state::RTCPeerConnectionState;
pub use signaling_state::RTCSignalingState;
