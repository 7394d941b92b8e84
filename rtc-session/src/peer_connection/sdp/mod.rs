//! Session description types and the normalization applied to descriptions
//! handed in by a signaling layer.

pub(crate) mod sdp_type;
pub(crate) mod session_description;

pub use sdp_type::RTCSdpType;
pub use session_description::{IntoSessionDescription, RTCSessionDescription};
