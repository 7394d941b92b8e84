use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::sdp_type::RTCSdpType;
use crate::error::{Error, Result};
use crate::peer_connection::transport::RTCIceCandidateInit;

const END_OF_CANDIDATES_LINE: &str = "a=end-of-candidates";

/// An offer or answer together with its opaque SDP body.
///
/// Values are immutable once produced; a connection replaces its local or
/// remote description wholesale instead of editing it.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,
}

impl Display for RTCSessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type: {}, sdp:\n{}",
            self.sdp_type,
            self.sdp.replace("\r\n", "\n")
        )
    }
}

impl RTCSessionDescription {
    pub fn answer(sdp: String) -> Result<RTCSessionDescription> {
        RTCSessionDescription::new(RTCSdpType::Answer, sdp)
    }

    pub fn offer(sdp: String) -> Result<RTCSessionDescription> {
        RTCSessionDescription::new(RTCSdpType::Offer, sdp)
    }

    pub fn pranswer(sdp: String) -> Result<RTCSessionDescription> {
        RTCSessionDescription::new(RTCSdpType::Pranswer, sdp)
    }

    fn new(sdp_type: RTCSdpType, sdp: String) -> Result<RTCSessionDescription> {
        let desc = RTCSessionDescription { sdp_type, sdp };
        desc.validate()?;
        Ok(desc)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self.sdp_type {
            RTCSdpType::Offer | RTCSdpType::Answer | RTCSdpType::Pranswer => {}
            RTCSdpType::Rollback => {
                return Err(Error::ErrInvalidSessionDescription(
                    "rollback is not supported".to_owned(),
                ));
            }
            RTCSdpType::Unspecified => {
                return Err(Error::ErrInvalidSessionDescription(
                    "missing or unknown type".to_owned(),
                ));
            }
        }
        if self.sdp.trim().is_empty() {
            return Err(Error::ErrInvalidSessionDescription(
                "empty sdp".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns the `m=` line media kinds in order of appearance.
    pub fn media_kinds(&self) -> Vec<String> {
        self.sdp
            .lines()
            .filter_map(|line| line.trim_end().strip_prefix("m="))
            .filter_map(|media| media.split_whitespace().next())
            .map(str::to_owned)
            .collect()
    }

    /// Returns a copy whose body carries `candidates` as `a=candidate` lines
    /// and an `a=end-of-candidates` marker in every media section.
    ///
    /// A candidate goes to the section addressed by its `sdpMLineIndex`,
    /// falling back to `sdpMid` and then to the first section. Lines already
    /// present in the target section are not repeated.
    pub fn with_candidates(&self, candidates: &[RTCIceCandidateInit]) -> RTCSessionDescription {
        let lines: Vec<&str> = self.sdp.lines().map(str::trim_end).collect();

        // [session, media 0, media 1, ...]
        let mut sections: Vec<Vec<String>> = vec![vec![]];
        for line in lines.iter().filter(|line| !line.is_empty()) {
            if line.starts_with("m=") {
                sections.push(vec![]);
            }
            if let Some(section) = sections.last_mut() {
                section.push((*line).to_owned());
            }
        }

        let media_count = sections.len() - 1;
        let mids: Vec<Option<String>> = sections[1..]
            .iter()
            .map(|section| {
                section
                    .iter()
                    .find_map(|line| line.strip_prefix("a=mid:").map(str::to_owned))
            })
            .collect();

        for candidate in candidates.iter().filter(|c| !c.is_end_of_candidates()) {
            let index = candidate
                .sdp_mline_index
                .map(usize::from)
                .filter(|index| *index < media_count)
                .or_else(|| {
                    candidate.sdp_mid.as_ref().and_then(|sdp_mid| {
                        mids.iter().position(|mid| mid.as_deref() == Some(sdp_mid.as_str()))
                    })
                })
                .unwrap_or(0);

            let line = if candidate.candidate.starts_with("candidate:") {
                format!("a={}", candidate.candidate)
            } else {
                format!("a=candidate:{}", candidate.candidate)
            };

            // session level when there is no media section at all
            let section = &mut sections[if media_count == 0 { 0 } else { index + 1 }];
            if !section.contains(&line) {
                let at = section
                    .iter()
                    .position(|l| l == END_OF_CANDIDATES_LINE)
                    .unwrap_or(section.len());
                section.insert(at, line);
            }
        }

        let first_media = if media_count == 0 { 0 } else { 1 };
        for section in &mut sections[first_media..] {
            if !section.iter().any(|l| l == END_OF_CANDIDATES_LINE) {
                section.push(END_OF_CANDIDATES_LINE.to_owned());
            }
        }

        let mut sdp = sections.concat().join("\r\n");
        sdp.push_str("\r\n");

        RTCSessionDescription {
            sdp_type: self.sdp_type,
            sdp,
        }
    }
}

/// Normalizes the shapes a session description may arrive in from a
/// signaling layer: the canonical value, a JSON attribute bag, JSON text or
/// a `(type, sdp)` pair all end up as a validated [`RTCSessionDescription`].
pub trait IntoSessionDescription {
    fn into_session_description(self) -> Result<RTCSessionDescription>;
}

impl IntoSessionDescription for RTCSessionDescription {
    fn into_session_description(self) -> Result<RTCSessionDescription> {
        self.validate()?;
        Ok(self)
    }
}

impl IntoSessionDescription for &RTCSessionDescription {
    fn into_session_description(self) -> Result<RTCSessionDescription> {
        self.clone().into_session_description()
    }
}

impl IntoSessionDescription for serde_json::Value {
    fn into_session_description(self) -> Result<RTCSessionDescription> {
        let sdp_type = match self.get("type") {
            Some(serde_json::Value::String(raw)) => RTCSdpType::from(raw.as_str()),
            _ => {
                return Err(Error::ErrInvalidSessionDescription(
                    "missing type field".to_owned(),
                ));
            }
        };
        let sdp = match self.get("sdp") {
            Some(serde_json::Value::String(sdp)) => sdp.clone(),
            _ => {
                return Err(Error::ErrInvalidSessionDescription(
                    "missing sdp field".to_owned(),
                ));
            }
        };
        RTCSessionDescription { sdp_type, sdp }.into_session_description()
    }
}

impl IntoSessionDescription for &str {
    fn into_session_description(self) -> Result<RTCSessionDescription> {
        let value: serde_json::Value = serde_json::from_str(self)
            .map_err(|e| Error::ErrInvalidSessionDescription(e.to_string()))?;
        value.into_session_description()
    }
}

impl IntoSessionDescription for String {
    fn into_session_description(self) -> Result<RTCSessionDescription> {
        self.as_str().into_session_description()
    }
}

impl IntoSessionDescription for (RTCSdpType, String) {
    fn into_session_description(self) -> Result<RTCSessionDescription> {
        RTCSessionDescription::new(self.0, self.1)
    }
}
