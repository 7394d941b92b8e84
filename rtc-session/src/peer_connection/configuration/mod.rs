//! Peer connection configuration.
//!
//! An [`RTCConfiguration`] is assembled with [`RTCConfigurationBuilder`] and is
//! immutable once a peer connection has been created from it.
//!
//! ```
//! use rtc_session::peer_connection::configuration::{
//!     RTCConfigurationBuilder, RTCIceGatheringPolicy,
//! };
//! use rtc_session::peer_connection::transport::RTCIceServer;
//!
//! let config = RTCConfigurationBuilder::new()
//!     .with_ice_servers(vec![RTCIceServer {
//!         urls: vec!["stun:stun.l.google.com:19302".to_owned()],
//!         ..Default::default()
//!     }])
//!     .with_ice_gathering_policy(RTCIceGatheringPolicy::Complete)
//!     .build();
//!
//! assert_eq!(config.ice_servers().len(), 1);
//! ```

pub mod ice_gathering_policy;
pub mod offer_answer_options;

use std::time::Duration;

pub use ice_gathering_policy::RTCIceGatheringPolicy;
pub use offer_answer_options::{RTCAnswerOptions, RTCOfferOptions};

use crate::error::{Error, Result};
use crate::peer_connection::transport::RTCIceServer;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// Default upper bound for a single data channel message, matching the
/// SCTP max message size most browsers advertise.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 262_144;

#[derive(Debug, Clone)]
pub struct RTCConfiguration {
    pub(crate) ice_servers: Vec<RTCIceServer>,

    pub(crate) ice_gathering_policy: RTCIceGatheringPolicy,

    /// Upper bound on a gathering pass; `None` waits for the engine's
    /// end-of-candidates indication forever.
    pub(crate) ice_gathering_timeout: Option<Duration>,

    pub(crate) max_message_size: usize,
}

impl Default for RTCConfiguration {
    fn default() -> Self {
        RTCConfigurationBuilder::new().build()
    }
}

impl RTCConfiguration {
    pub fn ice_servers(&self) -> &[RTCIceServer] {
        &self.ice_servers
    }

    pub fn ice_gathering_policy(&self) -> RTCIceGatheringPolicy {
        self.ice_gathering_policy
    }

    pub fn ice_gathering_timeout(&self) -> Option<Duration> {
        self.ice_gathering_timeout
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Returns the configured ICE servers with any query stripped from STUN
    /// URLs, the form an engine expects.
    #[allow(clippy::assigning_clones)]
    pub fn get_ice_servers(&self) -> Vec<RTCIceServer> {
        let mut ice_servers = self.ice_servers.clone();

        for ice_server in &mut ice_servers {
            for raw_url in &mut ice_server.urls {
                if raw_url.starts_with("stun") {
                    // strip the query from "stun(s):" if present
                    let parts: Vec<&str> = raw_url.split('?').collect();
                    *raw_url = parts[0].to_owned();
                }
            }
        }

        ice_servers
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for ice_server in &self.ice_servers {
            ice_server.validate()?;
        }
        if self.max_message_size == 0 {
            return Err(Error::ErrInvalidMaxMessageSize);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct RTCConfigurationBuilder {
    pub(crate) ice_servers: Vec<RTCIceServer>,

    pub(crate) ice_gathering_policy: RTCIceGatheringPolicy,

    pub(crate) ice_gathering_timeout: Option<Duration>,

    pub(crate) max_message_size: usize,
}

impl Default for RTCConfigurationBuilder {
    fn default() -> Self {
        RTCConfigurationBuilder {
            ice_servers: vec![],
            ice_gathering_policy: RTCIceGatheringPolicy::Complete,
            ice_gathering_timeout: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl RTCConfigurationBuilder {
    pub fn new() -> Self {
        RTCConfigurationBuilder::default()
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<RTCIceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_ice_gathering_policy(mut self, ice_gathering_policy: RTCIceGatheringPolicy) -> Self {
        self.ice_gathering_policy = ice_gathering_policy;
        self
    }

    pub fn with_ice_gathering_timeout(mut self, ice_gathering_timeout: Duration) -> Self {
        self.ice_gathering_timeout = Some(ice_gathering_timeout);
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn build(self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self.ice_servers,
            ice_gathering_policy: self.ice_gathering_policy,
            ice_gathering_timeout: self.ice_gathering_timeout,
            max_message_size: self.max_message_size,
        }
    }
}
