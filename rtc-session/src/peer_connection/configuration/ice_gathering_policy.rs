use std::fmt;

use serde::{Deserialize, Serialize};

use super::UNSPECIFIED_STR;

/// Controls when the local description is released as final.
///
/// With `Complete` the finalized description is held back until the
/// end-of-candidates marker has been observed and carries every gathered
/// candidate in its body, so one offer/answer message is enough. With
/// `Trickle` it is released as soon as the engine applied it and candidates
/// are forwarded individually.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceGatheringPolicy {
    Unspecified,

    #[default]
    #[serde(rename = "complete")]
    Complete,

    #[serde(rename = "trickle")]
    Trickle,
}

const ICE_GATHERING_POLICY_COMPLETE_STR: &str = "complete";
const ICE_GATHERING_POLICY_TRICKLE_STR: &str = "trickle";

impl From<&str> for RTCIceGatheringPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_GATHERING_POLICY_COMPLETE_STR => RTCIceGatheringPolicy::Complete,
            ICE_GATHERING_POLICY_TRICKLE_STR => RTCIceGatheringPolicy::Trickle,
            _ => RTCIceGatheringPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceGatheringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceGatheringPolicy::Complete => ICE_GATHERING_POLICY_COMPLETE_STR,
            RTCIceGatheringPolicy::Trickle => ICE_GATHERING_POLICY_TRICKLE_STR,
            RTCIceGatheringPolicy::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_ice_gathering_policy() {
        let tests = vec![
            ("Unspecified", RTCIceGatheringPolicy::Unspecified),
            ("complete", RTCIceGatheringPolicy::Complete),
            ("trickle", RTCIceGatheringPolicy::Trickle),
        ];

        for (policy_string, expected_policy) in tests {
            assert_eq!(RTCIceGatheringPolicy::from(policy_string), expected_policy);
        }
    }

    #[test]
    fn test_ice_gathering_policy_string() {
        let tests = vec![
            (RTCIceGatheringPolicy::Unspecified, "Unspecified"),
            (RTCIceGatheringPolicy::Complete, "complete"),
            (RTCIceGatheringPolicy::Trickle, "trickle"),
        ];

        for (policy, expected_string) in tests {
            assert_eq!(policy.to_string(), expected_string);
        }
    }
}
