use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::peer_connection::configuration::UNSPECIFIED_STR;

const CANDIDATE_PREFIX: &str = "candidate:";

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceCandidateType {
    #[default]
    Unspecified,

    #[serde(rename = "host")]
    Host,

    #[serde(rename = "srflx")]
    Srflx,

    #[serde(rename = "prflx")]
    Prflx,

    #[serde(rename = "relay")]
    Relay,
}

const ICE_CANDIDATE_TYPE_HOST_STR: &str = "host";
const ICE_CANDIDATE_TYPE_SRFLX_STR: &str = "srflx";
const ICE_CANDIDATE_TYPE_PRFLX_STR: &str = "prflx";
const ICE_CANDIDATE_TYPE_RELAY_STR: &str = "relay";

impl From<&str> for RTCIceCandidateType {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_CANDIDATE_TYPE_HOST_STR => RTCIceCandidateType::Host,
            ICE_CANDIDATE_TYPE_SRFLX_STR => RTCIceCandidateType::Srflx,
            ICE_CANDIDATE_TYPE_PRFLX_STR => RTCIceCandidateType::Prflx,
            ICE_CANDIDATE_TYPE_RELAY_STR => RTCIceCandidateType::Relay,
            _ => RTCIceCandidateType::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceCandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceCandidateType::Host => ICE_CANDIDATE_TYPE_HOST_STR,
            RTCIceCandidateType::Srflx => ICE_CANDIDATE_TYPE_SRFLX_STR,
            RTCIceCandidateType::Prflx => ICE_CANDIDATE_TYPE_PRFLX_STR,
            RTCIceCandidateType::Relay => ICE_CANDIDATE_TYPE_RELAY_STR,
            RTCIceCandidateType::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceProtocol {
    #[default]
    Unspecified,

    #[serde(rename = "udp")]
    Udp,

    #[serde(rename = "tcp")]
    Tcp,
}

const ICE_PROTOCOL_UDP_STR: &str = "udp";
const ICE_PROTOCOL_TCP_STR: &str = "tcp";

impl From<&str> for RTCIceProtocol {
    fn from(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case(ICE_PROTOCOL_UDP_STR) {
            RTCIceProtocol::Udp
        } else if raw.eq_ignore_ascii_case(ICE_PROTOCOL_TCP_STR) {
            RTCIceProtocol::Tcp
        } else {
            RTCIceProtocol::Unspecified
        }
    }
}

impl fmt::Display for RTCIceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceProtocol::Udp => ICE_PROTOCOL_UDP_STR,
            RTCIceProtocol::Tcp => ICE_PROTOCOL_TCP_STR,
            RTCIceProtocol::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// A parsed `candidate-attribute` line (RFC 8839 section 5.1).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCIceCandidate {
    pub foundation: String,
    pub component: u16,
    pub protocol: RTCIceProtocol,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    pub typ: RTCIceCandidateType,
    pub related_address: String,
    pub related_port: u16,
}

impl RTCIceCandidate {
    /// Parses a candidate line, with or without the `candidate:` prefix.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix(CANDIDATE_PREFIX).unwrap_or(raw);
        let split: Vec<&str> = raw.split_whitespace().collect();
        if split.len() < 8 {
            return Err(Error::ErrCandidateMalformed(format!(
                "attribute too short ({})",
                split.len()
            )));
        }

        let malformed = |what: &str, value: &str| {
            Error::ErrCandidateMalformed(format!("invalid {what} {value:?}"))
        };

        let foundation = split[0].to_owned();
        let component: u16 = split[1]
            .parse()
            .map_err(|_| malformed("component", split[1]))?;
        let protocol = RTCIceProtocol::from(split[2]);
        if protocol == RTCIceProtocol::Unspecified {
            return Err(malformed("transport", split[2]));
        }
        let priority: u32 = split[3]
            .parse()
            .map_err(|_| malformed("priority", split[3]))?;
        let address = split[4].to_owned();
        let port: u16 = split[5].parse().map_err(|_| malformed("port", split[5]))?;
        if split[6] != "typ" {
            return Err(malformed("type marker", split[6]));
        }
        let typ = RTCIceCandidateType::from(split[7]);
        if typ == RTCIceCandidateType::Unspecified {
            return Err(malformed("candidate type", split[7]));
        }

        let mut related_address = String::new();
        let mut related_port = 0;
        for pair in split[8..].chunks(2) {
            match pair {
                ["raddr", value] => related_address = (*value).to_owned(),
                ["rport", value] => {
                    related_port = value.parse().map_err(|_| malformed("rport", *value))?;
                }
                [_, _] => {}
                [key] => return Err(malformed("extension without value", *key)),
                _ => {}
            }
        }

        Ok(RTCIceCandidate {
            foundation,
            component,
            protocol,
            priority,
            address,
            port,
            typ,
            related_address,
            related_port,
        })
    }

    pub fn to_json(&self, sdp_mid: &str, sdp_mline_index: u16) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: self.to_string(),
            sdp_mid: Some(sdp_mid.to_owned()),
            sdp_mline_index: Some(sdp_mline_index),
            username_fragment: None,
            url: None,
        }
    }
}

impl fmt::Display for RTCIceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{CANDIDATE_PREFIX}{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.address,
            self.port,
            self.typ,
        )?;
        if !self.related_address.is_empty() {
            write!(
                f,
                " raddr {} rport {}",
                self.related_address, self.related_port
            )?;
        }
        Ok(())
    }
}

/// The signaling form of an ICE candidate, as exchanged with the remote peer.
///
/// An empty `candidate` string is the end-of-candidates indication some
/// platforms use instead of a null candidate.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RTCIceCandidateInit {
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.trim().is_empty()
    }

    /// Parses the candidate line; fails for the end-of-candidates indication.
    pub fn to_candidate(&self) -> Result<RTCIceCandidate> {
        RTCIceCandidate::parse(&self.candidate)
    }

    /// Decodes the JSON form produced by a remote peer.
    ///
    /// Unlike a plain serde decode, a missing `candidate` field is reported as
    /// [`Error::ErrCandidateMalformed`].
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| Error::ErrCandidateMalformed(e.to_string()))?;
        RTCIceCandidateInit::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        match value.get("candidate") {
            Some(serde_json::Value::String(_)) => {}
            Some(serde_json::Value::Null) | None => {
                return Err(Error::ErrCandidateMalformed(
                    "missing candidate field".to_owned(),
                ));
            }
            Some(other) => {
                return Err(Error::ErrCandidateMalformed(format!(
                    "candidate field is not a string: {other}"
                )));
            }
        }
        serde_json::from_value(value).map_err(|e| Error::ErrCandidateMalformed(e.to_string()))
    }
}

/// Normalizes the loosely typed candidate shapes a signaling layer may hand
/// over into an [`RTCIceCandidateInit`].
pub trait IntoIceCandidateInit {
    fn into_ice_candidate_init(self) -> Result<RTCIceCandidateInit>;
}

impl IntoIceCandidateInit for RTCIceCandidateInit {
    fn into_ice_candidate_init(self) -> Result<RTCIceCandidateInit> {
        Ok(self)
    }
}

impl IntoIceCandidateInit for serde_json::Value {
    fn into_ice_candidate_init(self) -> Result<RTCIceCandidateInit> {
        RTCIceCandidateInit::from_value(self)
    }
}

impl IntoIceCandidateInit for &str {
    fn into_ice_candidate_init(self) -> Result<RTCIceCandidateInit> {
        RTCIceCandidateInit::from_json(self)
    }
}

impl IntoIceCandidateInit for String {
    fn into_ice_candidate_init(self) -> Result<RTCIceCandidateInit> {
        RTCIceCandidateInit::from_json(&self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_candidate_serialization() {
        let tests = vec![
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: Some("0".to_string()),
                    sdp_mline_index: Some(0),
                    username_fragment: Some("def".to_string()),
                    url: None,
                },
                r#"{"candidate":"candidate:abc123","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"def"}"#,
            ),
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: None,
                    sdp_mline_index: None,
                    username_fragment: None,
                    url: None,
                },
                r#"{"candidate":"candidate:abc123","sdpMid":null,"sdpMLineIndex":null,"usernameFragment":null}"#,
            ),
        ];

        for (candidate_init, expected_string) in tests {
            let candidate_data =
                serde_json::to_string(&candidate_init).expect("candidate init marshals");
            assert_eq!(candidate_data, expected_string, "string is not expected");

            let actual = RTCIceCandidateInit::from_json(&candidate_data)
                .expect("candidate init unmarshals");
            assert_eq!(actual, candidate_init);
        }
    }

    #[test]
    fn test_ice_candidate_from_json_missing_candidate() {
        let tests = vec![
            r#"{"sdpMid":"0","sdpMLineIndex":0}"#,
            r#"{"candidate":null,"sdpMid":"0"}"#,
            r#"{"candidate":42}"#,
            r#"not json"#,
        ];

        for raw in tests {
            let err = RTCIceCandidateInit::from_json(raw).expect_err(raw);
            assert!(
                matches!(err, Error::ErrCandidateMalformed(_)),
                "{raw}: unexpected {err:?}"
            );
        }
    }

    #[test]
    fn test_ice_candidate_parse() {
        let tests = vec![
            (
                "candidate:1 1 udp 2130706431 192.168.1.100 50000 typ host",
                RTCIceCandidate {
                    foundation: "1".to_owned(),
                    component: 1,
                    protocol: RTCIceProtocol::Udp,
                    priority: 2130706431,
                    address: "192.168.1.100".to_owned(),
                    port: 50000,
                    typ: RTCIceCandidateType::Host,
                    ..Default::default()
                },
            ),
            (
                "842163049 1 UDP 1677729535 203.0.113.7 61665 typ srflx raddr 10.0.0.2 rport 61665 generation 0",
                RTCIceCandidate {
                    foundation: "842163049".to_owned(),
                    component: 1,
                    protocol: RTCIceProtocol::Udp,
                    priority: 1677729535,
                    address: "203.0.113.7".to_owned(),
                    port: 61665,
                    typ: RTCIceCandidateType::Srflx,
                    related_address: "10.0.0.2".to_owned(),
                    related_port: 61665,
                },
            ),
        ];

        for (raw, expected) in tests {
            let candidate = RTCIceCandidate::parse(raw).expect(raw);
            assert_eq!(candidate, expected, "testCase: {raw}");
        }
    }

    #[test]
    fn test_ice_candidate_parse_malformed() {
        let tests = vec![
            "",
            "candidate:1 1 udp 2130706431 192.168.1.100 50000 typ",
            "candidate:1 x udp 2130706431 192.168.1.100 50000 typ host",
            "candidate:1 1 sctp 2130706431 192.168.1.100 50000 typ host",
            "candidate:1 1 udp 2130706431 192.168.1.100 99999 typ host",
            "candidate:1 1 udp 2130706431 192.168.1.100 50000 type host",
            "candidate:1 1 udp 2130706431 192.168.1.100 50000 typ bogus",
        ];

        for raw in tests {
            let err = RTCIceCandidate::parse(raw).expect_err(raw);
            assert!(
                matches!(err, Error::ErrCandidateMalformed(_)),
                "{raw}: unexpected {err:?}"
            );
        }
    }

    #[test]
    fn test_ice_candidate_marshal() {
        let raw = "candidate:842163049 1 udp 1677729535 203.0.113.7 61665 typ srflx raddr 10.0.0.2 rport 61665";
        let candidate = RTCIceCandidate::parse(raw).expect("valid candidate");
        assert_eq!(candidate.to_string(), raw);

        let init = candidate.to_json("0", 0);
        assert_eq!(init.candidate, raw);
        assert!(!init.is_end_of_candidates());
        assert!(RTCIceCandidateInit::default().is_end_of_candidates());
    }
}
