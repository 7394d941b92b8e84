//! Boundary with the underlying communication engine.
//!
//! A peer connection never touches sockets, DTLS or SCTP itself. It emits
//! [`EngineCommand`]s from `poll_write` and consumes [`EngineEvent`]s through
//! `handle_read`. An [`Engine`] executes the commands for one transport
//! session and reports back asynchronously through an [`EngineEventSender`].
//!
//! Every command that expects an answer carries a [`RequestId`]; the engine
//! echoes it in the matching completion event.

pub mod loopback;

use tokio::sync::mpsc;

use crate::data_channel::{RTCDataChannelId, RTCDataChannelInit, RTCDataChannelMessage};
use crate::error::{Error, Result};
use crate::media_stream::MediaStream;
use crate::peer_connection::configuration::{RTCAnswerOptions, RTCConfiguration, RTCOfferOptions};
use crate::peer_connection::sdp::RTCSessionDescription;
use crate::peer_connection::state::RTCPeerConnectionState;
use crate::peer_connection::transport::RTCIceCandidateInit;

/// Correlates an operation with its completion.
pub type RequestId = u64;

#[derive(Debug, Clone)]
pub enum EngineCommand {
    AddStream(MediaStream),
    GenerateOffer {
        request: RequestId,
        options: RTCOfferOptions,
    },
    GenerateAnswer {
        request: RequestId,
        options: RTCAnswerOptions,
    },
    ApplyLocalDescription {
        request: RequestId,
        description: RTCSessionDescription,
    },
    ApplyRemoteDescription {
        request: RequestId,
        description: RTCSessionDescription,
    },
    AddIceCandidate {
        request: RequestId,
        candidate: RTCIceCandidateInit,
    },
    OpenChannel {
        channel: RTCDataChannelId,
        label: String,
        init: RTCDataChannelInit,
    },
    Send {
        channel: RTCDataChannelId,
        message: RTCDataChannelMessage,
    },
    CloseChannel {
        channel: RTCDataChannelId,
    },
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    OfferGenerated {
        request: RequestId,
        result: Result<RTCSessionDescription>,
    },
    AnswerGenerated {
        request: RequestId,
        result: Result<RTCSessionDescription>,
    },
    LocalDescriptionApplied {
        request: RequestId,
        result: Result<()>,
    },
    RemoteDescriptionApplied {
        request: RequestId,
        result: Result<()>,
    },
    IceCandidateAdded {
        request: RequestId,
        result: Result<()>,
    },
    /// A locally discovered candidate. `None`, or a candidate with an empty
    /// `candidate` string, ends the current gathering pass.
    IceCandidate(Option<RTCIceCandidateInit>),
    ConnectionStateChange(RTCPeerConnectionState),
    ChannelOpen(RTCDataChannelId),
    ChannelError(RTCDataChannelId, Error),
    ChannelClose(RTCDataChannelId),
    IncomingChannel {
        channel: RTCDataChannelId,
        label: String,
        init: RTCDataChannelInit,
    },
    Message {
        channel: RTCDataChannelId,
        message: RTCDataChannelMessage,
    },
    /// A media stream attached by the remote peer.
    RemoteStream(MediaStream),
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// One native transport session.
pub trait Engine: Send {
    /// Executes a command. Results are reported through the session's
    /// [`EngineEventSender`]; an `Err` here means the session is unusable.
    fn handle_command(&mut self, command: EngineCommand) -> Result<()>;
}

/// Creates transport sessions from an ICE configuration.
pub trait EngineFactory: Send + Sync {
    fn create_session(
        &self,
        config: &RTCConfiguration,
        events: EngineEventSender,
    ) -> Result<Box<dyn Engine>>;
}
