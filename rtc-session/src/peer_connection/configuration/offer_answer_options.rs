/// Options for [`create_answer`](crate::peer_connection::RTCPeerConnection::create_answer).
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone)]
pub struct RTCAnswerOptions {
    /// Whether the engine should run voice activity detection on the
    /// audio sections it answers.
    pub voice_activity_detection: bool,
}

/// Options for [`create_offer`](crate::peer_connection::RTCPeerConnection::create_offer).
///
/// `offer_to_receive_audio` and `offer_to_receive_video` ask for a receiving
/// media section of that kind even when no local stream carries such a track.
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone)]
pub struct RTCOfferOptions {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
    pub ice_restart: bool,
}

impl RTCOfferOptions {
    /// Offer options requesting both an audio and a video receive section.
    pub fn receive_audio_video() -> Self {
        RTCOfferOptions {
            offer_to_receive_audio: true,
            offer_to_receive_video: true,
            ..Default::default()
        }
    }
}
