use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    //Media
    /// ErrPermissionDenied indicates that the platform or the user refused
    /// access to the requested capture devices.
    #[error("media: permission denied")]
    ErrPermissionDenied,

    /// ErrDeviceUnavailable indicates that the platform lacks a device for
    /// the requested capability.
    #[error("media: no {0} device available")]
    ErrDeviceUnavailable(String),

    /// ErrInvalidConstraints indicates that neither audio nor video was requested.
    #[error("media: constraints must request audio or video")]
    ErrInvalidConstraints,

    //Configuration
    #[error("invalid ice server url: {0}")]
    ErrInvalidIceServerUrl(String),

    /// ErrNoTurnCredentials indicates that a TURN server URL was provided
    /// without required credentials.
    #[error("turn server credentials required")]
    ErrNoTurnCredentials,

    #[error("max message size must be greater than zero")]
    ErrInvalidMaxMessageSize,

    //Negotiation
    /// ErrInvalidState indicates an operation issued out of order for the
    /// current negotiation state.
    #[error("invalid state: {0}")]
    ErrInvalidState(String),

    #[error("can't rollback from stable state")]
    ErrSignalingStateCannotRollback,

    #[error("invalid proposed signaling state transition: {0}")]
    ErrSignalingStateProposedTransitionInvalid(String),

    /// ErrNoRemoteDescription indicates that an operation was rejected because
    /// the remote description is not set
    #[error("remote description is not set")]
    ErrNoRemoteDescription,

    #[error("invalid session description: {0}")]
    ErrInvalidSessionDescription(String),

    /// ErrNegotiation carries a failure reported by the engine while generating
    /// or applying a session description.
    #[error("negotiation failed: {0}")]
    ErrNegotiation(String),

    //Candidate
    #[error("malformed ice candidate: {0}")]
    ErrCandidateMalformed(String),

    //DataChannel
    #[error("data channel failed to open: {0}")]
    ErrDataChannelOpen(String),

    #[error("data channel label {0:?} is already in use")]
    ErrDataChannelLabelInUse(String),

    /// ErrStringSizeLimit indicates that the character size limit of string is
    /// exceeded. The limit is hardcoded to 65535 according to specifications.
    #[error("data channel label exceeds size limit")]
    ErrStringSizeLimit,

    /// ErrProtocolTooLarge indicates that value given for a DataChannelInit protocol is
    /// longer then 65535 bytes
    #[error("protocol is larger then 65535 bytes")]
    ErrProtocolTooLarge,

    /// ErrRetransmitsOrPacketLifeTime indicates that an attempt to create a data
    /// channel was made with both options max_packet_life_time and max_retransmits
    /// set together.
    #[error("both max_packet_life_time and max_retransmits was set")]
    ErrRetransmitsOrPacketLifeTime,

    #[error("outbound packet larger than maximum message size")]
    ErrOutboundPacketTooLarge,

    /// ErrDataChannelClosed indicates an operation executed when the data
    /// channel is not (yet) open or closed.
    #[error("data channel closed")]
    ErrDataChannelClosed,

    #[error("data channel not existed")]
    ErrDataChannelNotExisted,

    #[error("stream already subscribed")]
    ErrAlreadySubscribed,

    //Connection
    /// ErrConnectionClosed indicates an operation executed after connection
    /// has already been closed.
    #[error("connection closed")]
    ErrConnectionClosed,

    #[error("engine: {0}")]
    ErrEngine(String),

    #[error("mutex poison: {0}")]
    PoisonError(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`Error`] used by callers that only care about
/// which layer failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Media,
    Config,
    Negotiation,
    Candidate,
    Channel,
    ConnectionClosed,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ErrorKind::Media => "media",
            ErrorKind::Config => "config",
            ErrorKind::Negotiation => "negotiation",
            ErrorKind::Candidate => "candidate",
            ErrorKind::Channel => "channel",
            ErrorKind::ConnectionClosed => "connection-closed",
            ErrorKind::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ErrPermissionDenied
            | Error::ErrDeviceUnavailable(_)
            | Error::ErrInvalidConstraints => ErrorKind::Media,
            Error::ErrInvalidIceServerUrl(_)
            | Error::ErrNoTurnCredentials
            | Error::ErrInvalidMaxMessageSize => ErrorKind::Config,
            Error::ErrInvalidState(_)
            | Error::ErrSignalingStateCannotRollback
            | Error::ErrSignalingStateProposedTransitionInvalid(_)
            | Error::ErrNoRemoteDescription
            | Error::ErrInvalidSessionDescription(_)
            | Error::ErrNegotiation(_) => ErrorKind::Negotiation,
            Error::ErrCandidateMalformed(_) => ErrorKind::Candidate,
            Error::ErrDataChannelOpen(_)
            | Error::ErrDataChannelLabelInUse(_)
            | Error::ErrStringSizeLimit
            | Error::ErrProtocolTooLarge
            | Error::ErrRetransmitsOrPacketLifeTime
            | Error::ErrOutboundPacketTooLarge
            | Error::ErrDataChannelClosed
            | Error::ErrDataChannelNotExisted
            | Error::ErrAlreadySubscribed => ErrorKind::Channel,
            Error::ErrConnectionClosed => ErrorKind::ConnectionClosed,
            Error::ErrEngine(_) | Error::PoisonError(_) | Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Reports whether the error is the "invalid state" subtype of negotiation
    /// errors, i.e. an operation was issued out of order.
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Error::ErrInvalidState(_)
                | Error::ErrSignalingStateCannotRollback
                | Error::ErrSignalingStateProposedTransitionInvalid(_)
                | Error::ErrNoRemoteDescription
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}
