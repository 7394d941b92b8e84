use crate::peer_connection::transport::RTCIceCandidateInit;

/// A locally gathered candidate, ready to be relayed to the remote peer.
///
/// `candidate == None` is the end-of-candidates indication of the current
/// gathering pass.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct RTCPeerConnectionIceEvent {
    pub candidate: Option<RTCIceCandidateInit>,
}

impl RTCPeerConnectionIceEvent {
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_none()
    }
}

impl From<Option<RTCIceCandidateInit>> for RTCPeerConnectionIceEvent {
    /// Both engine spellings of end-of-candidates, a null candidate and an
    /// empty candidate string, collapse to `None`.
    fn from(candidate: Option<RTCIceCandidateInit>) -> Self {
        RTCPeerConnectionIceEvent {
            candidate: candidate.filter(|c| !c.is_end_of_candidates()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_event_end_of_candidates() {
        let host = RTCIceCandidateInit {
            candidate: "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host".to_owned(),
            sdp_mid: Some("0".to_owned()),
            sdp_mline_index: Some(0),
            ..Default::default()
        };

        let tests = vec![
            ("null", None, true),
            ("empty", Some(RTCIceCandidateInit::default()), true),
            (
                "whitespace",
                Some(RTCIceCandidateInit {
                    candidate: "  ".to_owned(),
                    ..Default::default()
                }),
                true,
            ),
            ("host", Some(host), false),
        ];

        for (name, candidate, expected) in tests {
            let event = RTCPeerConnectionIceEvent::from(candidate);
            assert_eq!(event.is_end_of_candidates(), expected, "testCase: {name}");
        }
    }
}
