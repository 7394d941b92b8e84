use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::peer_connection::configuration::UNSPECIFIED_STR;

/// Indicates the type of credentials used to connect to an ICE server.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceCredentialType {
    Unspecified,

    #[default]
    #[serde(rename = "password")]
    Password,

    #[serde(rename = "oauth")]
    Oauth,
}

const ICE_CREDENTIAL_TYPE_PASSWORD_STR: &str = "password";
const ICE_CREDENTIAL_TYPE_OAUTH_STR: &str = "oauth";

impl From<&str> for RTCIceCredentialType {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_CREDENTIAL_TYPE_PASSWORD_STR => RTCIceCredentialType::Password,
            ICE_CREDENTIAL_TYPE_OAUTH_STR => RTCIceCredentialType::Oauth,
            _ => RTCIceCredentialType::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceCredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceCredentialType::Password => ICE_CREDENTIAL_TYPE_PASSWORD_STR,
            RTCIceCredentialType::Oauth => ICE_CREDENTIAL_TYPE_OAUTH_STR,
            RTCIceCredentialType::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Describes a single STUN or TURN server that the engine may use while
/// gathering candidates.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub credential_type: RTCIceCredentialType,
}

impl RTCIceServer {
    pub(crate) fn parse_url(raw_url: &str) -> Result<Url> {
        let url =
            Url::parse(raw_url).map_err(|e| Error::ErrInvalidIceServerUrl(format!("{raw_url}: {e}")))?;

        match url.scheme() {
            "stun" | "stuns" | "turn" | "turns" => {}
            scheme => {
                return Err(Error::ErrInvalidIceServerUrl(format!(
                    "{raw_url}: unknown scheme {scheme}"
                )));
            }
        }

        // stun:host:port parses as a path with no authority
        let host = url.path().split(':').next().unwrap_or_default();
        if host.is_empty() {
            return Err(Error::ErrInvalidIceServerUrl(format!(
                "{raw_url}: missing host"
            )));
        }

        Ok(url)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.urls.is_empty() {
            return Err(Error::ErrInvalidIceServerUrl("no urls".to_owned()));
        }

        for raw_url in &self.urls {
            let url = RTCIceServer::parse_url(raw_url)?;

            if matches!(url.scheme(), "turn" | "turns")
                && (self.username.is_empty() || self.credential.is_empty())
            {
                return Err(Error::ErrNoTurnCredentials);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_server_validate_success() {
        let tests = vec![
            RTCIceServer {
                urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                username: "unittest".to_owned(),
                credential: "placeholder".to_owned(),
                credential_type: RTCIceCredentialType::Password,
            },
            RTCIceServer {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                ..Default::default()
            },
            RTCIceServer {
                urls: vec![
                    "stuns:stun.example.org:5349".to_owned(),
                    "turns:turn.example.org:5349?transport=tcp".to_owned(),
                ],
                username: "unittest".to_owned(),
                credential: "placeholder".to_owned(),
                credential_type: RTCIceCredentialType::Oauth,
            },
        ];

        for ice_server in tests {
            assert!(ice_server.validate().is_ok(), "testCase: {ice_server:?}");
        }
    }

    #[test]
    fn test_ice_server_validate_failure() {
        let tests = vec![
            (
                RTCIceServer {
                    urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                    ..Default::default()
                },
                Error::ErrNoTurnCredentials,
            ),
            (
                RTCIceServer {
                    urls: vec!["http://stun.example.org".to_owned()],
                    ..Default::default()
                },
                Error::ErrInvalidIceServerUrl(
                    "http://stun.example.org: unknown scheme http".to_owned(),
                ),
            ),
            (
                RTCIceServer {
                    urls: vec![],
                    ..Default::default()
                },
                Error::ErrInvalidIceServerUrl("no urls".to_owned()),
            ),
        ];

        for (ice_server, expected_err) in tests {
            assert_eq!(ice_server.validate(), Err(expected_err));
        }
    }

    #[test]
    fn test_ice_server_json() {
        let raw = r#"{"urls":["turn:turn.example.org"],"username":"jch","credential":"topsecret"}"#;
        let ice_server: RTCIceServer = serde_json::from_str(raw).expect("valid ice server json");
        assert_eq!(ice_server.urls, vec!["turn:turn.example.org".to_owned()]);
        assert_eq!(ice_server.username, "jch");
        assert_eq!(ice_server.credential_type, RTCIceCredentialType::Password);
        assert!(ice_server.validate().is_ok());
    }
}
