//! The sans-I/O peer connection.
//!
//! [`RTCPeerConnection`] owns the negotiation state, the candidate gathering
//! pass and the data channels of one transport session. It performs no I/O:
//!
//! - user operations return a [`RequestId`] and complete later through
//!   [`poll_event`](sansio::Protocol::poll_event),
//! - commands for the engine are drained with [`poll_write`](sansio::Protocol::poll_write),
//! - engine notifications are fed in with [`handle_read`](sansio::Protocol::handle_read),
//! - inbound data channel messages come out of [`poll_read`](sansio::Protocol::poll_read).
//!
//! ```
//! use rtc_session::engine::EngineCommand;
//! use rtc_session::peer_connection::RTCPeerConnection;
//! use rtc_session::peer_connection::configuration::{RTCConfiguration, RTCOfferOptions};
//! use rtc_session::sansio::Protocol;
//!
//! # fn main() -> rtc_session::error::Result<()> {
//! let mut pc = RTCPeerConnection::new(RTCConfiguration::default())?;
//! let request = pc.create_offer(Some(RTCOfferOptions::receive_audio_video()));
//!
//! match pc.poll_write() {
//!     Some(EngineCommand::GenerateOffer { request: r, options }) => {
//!         assert_eq!(r, request);
//!         assert!(options.offer_to_receive_video);
//!     }
//!     other => panic!("unexpected command {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod configuration;
pub mod event;
pub(crate) mod gatherer;
pub(crate) mod negotiator;
pub mod sdp;
pub mod state;
pub mod transport;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{debug, trace, warn};

use crate::data_channel::manager::DataChannelManager;
use crate::data_channel::{
    RTCDataChannel, RTCDataChannelId, RTCDataChannelInit, RTCDataChannelMessage,
};
use crate::engine::{EngineCommand, EngineEvent, RequestId};
use crate::error::{Error, Result};
use crate::media_stream::MediaStream;
use configuration::{RTCAnswerOptions, RTCConfiguration, RTCOfferOptions};
use event::{RTCPeerConnectionEvent, RTCPeerConnectionIceErrorEvent};
use gatherer::CandidateGatherer;
use negotiator::{Operation, SessionNegotiator};
use sdp::{IntoSessionDescription, RTCSessionDescription};
use state::{
    RTCIceGatheringState, RTCNegotiationState, RTCPeerConnectionState, RTCSignalingState,
};
use transport::{IntoIceCandidateInit, RTCIceCandidateInit};

static PEER_CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Default)]
pub(crate) struct PipelineContext {
    pub(crate) read_outs: VecDeque<(RTCDataChannelId, RTCDataChannelMessage)>,
    pub(crate) write_outs: VecDeque<EngineCommand>,
    pub(crate) event_outs: VecDeque<RTCPeerConnectionEvent>,
}

/// PeerConnection represents one negotiated session with a remote peer,
/// driven through an external engine.
pub struct RTCPeerConnection {
    id: String,
    configuration: RTCConfiguration,
    peer_connection_state: RTCPeerConnectionState,
    streams: Vec<MediaStream>,
    remote_streams: Vec<MediaStream>,
    next_request: RequestId,
    is_closed: bool,

    pub(crate) negotiator: SessionNegotiator,
    pub(crate) gatherer: CandidateGatherer,
    pub(crate) data_channels: DataChannelManager,
    pub(crate) pipeline_context: PipelineContext,
}

impl RTCPeerConnection {
    /// creates a PeerConnection with RTCConfiguration
    pub fn new(configuration: RTCConfiguration) -> Result<Self> {
        configuration.validate()?;

        let id = format!(
            "pc-{}",
            PEER_CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        debug!(
            "[{id}] created with {} ice server(s), gathering policy {}",
            configuration.ice_servers().len(),
            configuration.ice_gathering_policy()
        );

        let negotiator = SessionNegotiator::default().with_log_id(&id);
        let gatherer = CandidateGatherer::new(
            configuration.ice_gathering_policy(),
            configuration.ice_gathering_timeout(),
        )
        .with_log_id(&id);
        let data_channels =
            DataChannelManager::new(configuration.max_message_size()).with_log_id(&id);

        Ok(Self {
            id,
            configuration,
            peer_connection_state: RTCPeerConnectionState::New,
            streams: vec![],
            remote_streams: vec![],
            next_request: 0,
            is_closed: false,
            negotiator,
            gatherer,
            data_channels,
            pipeline_context: PipelineContext::default(),
        })
    }

    /// Connection-scoped identifier used to prefix log lines.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get_configuration(&self) -> &RTCConfiguration {
        &self.configuration
    }

    fn next_request(&mut self) -> RequestId {
        let request = self.next_request;
        self.next_request += 1;
        request
    }

    /// Moves everything the components produced into the event queue.
    fn collect_events(&mut self) {
        while let Some(evt) = self.negotiator.poll_event() {
            self.pipeline_context.event_outs.push_back(evt);
        }
        while let Some(evt) = self.gatherer.poll_event() {
            self.pipeline_context.event_outs.push_back(evt);
        }
        while let Some(evt) = self.data_channels.poll_event() {
            self.pipeline_context
                .event_outs
                .push_back(RTCPeerConnectionEvent::OnDataChannel(evt));
        }
    }

    fn dispatch(&mut self) {
        if let Some(command) = self.negotiator.dispatch() {
            if matches!(command, EngineCommand::ApplyLocalDescription { .. }) {
                self.gatherer.begin_pass(Instant::now());
            }
            trace!("[{}] dispatch {command:?}", self.id);
            self.pipeline_context.write_outs.push_back(command);
        }
    }

    fn issue(
        &mut self,
        operation: Result<Operation>,
        failed: impl FnOnce(RequestId, Error) -> RTCPeerConnectionEvent,
    ) -> RequestId {
        let request = self.next_request();
        match operation {
            Ok(operation) => {
                self.negotiator.enqueue(request, operation);
                self.dispatch();
            }
            Err(_) if self.is_closed => {
                self.pipeline_context
                    .event_outs
                    .push_back(failed(request, Error::ErrConnectionClosed));
            }
            Err(err) => {
                debug!("[{}] request {request} rejected: {err}", self.id);
                self.pipeline_context.event_outs.push_back(failed(request, err));
            }
        }
        self.collect_events();
        request
    }

    /// create_offer asks the engine for an offer. Completes with
    /// [`RTCPeerConnectionEvent::OnOfferCreated`].
    pub fn create_offer(&mut self, options: Option<RTCOfferOptions>) -> RequestId {
        self.issue(
            Ok(Operation::CreateOffer(options.unwrap_or_default())),
            |request, err| RTCPeerConnectionEvent::OnOfferCreated(request, Err(err)),
        )
    }

    /// create_answer asks the engine for an answer to the applied remote
    /// offer. Completes with [`RTCPeerConnectionEvent::OnAnswerCreated`].
    pub fn create_answer(&mut self, options: Option<RTCAnswerOptions>) -> RequestId {
        self.issue(
            Ok(Operation::CreateAnswer(options.unwrap_or_default())),
            |request, err| RTCPeerConnectionEvent::OnAnswerCreated(request, Err(err)),
        )
    }

    /// set_local_description commits `description` as the local description
    /// and starts a candidate gathering pass. Completes with
    /// [`RTCPeerConnectionEvent::OnLocalDescriptionSet`]; the finalized
    /// description follows as [`RTCPeerConnectionEvent::OnLocalDescriptionFinalized`].
    pub fn set_local_description(&mut self, description: impl IntoSessionDescription) -> RequestId {
        self.issue(
            description
                .into_session_description()
                .map(Operation::SetLocalDescription),
            |request, err| RTCPeerConnectionEvent::OnLocalDescriptionSet(request, Err(err)),
        )
    }

    /// set_remote_description commits the peer's description. Completes with
    /// [`RTCPeerConnectionEvent::OnRemoteDescriptionSet`].
    pub fn set_remote_description(
        &mut self,
        description: impl IntoSessionDescription,
    ) -> RequestId {
        self.issue(
            description
                .into_session_description()
                .map(Operation::SetRemoteDescription),
            |request, err| RTCPeerConnectionEvent::OnRemoteDescriptionSet(request, Err(err)),
        )
    }

    /// add_ice_candidate hands a remote candidate to the engine. A malformed
    /// candidate fails the request and raises
    /// [`RTCPeerConnectionEvent::OnIceCandidateErrorEvent`]; the connection
    /// stays usable.
    pub fn add_ice_candidate(&mut self, candidate: impl IntoIceCandidateInit) -> RequestId {
        match candidate.into_ice_candidate_init() {
            Ok(candidate) => self.issue(Ok(Operation::AddIceCandidate(candidate)), |request, err| {
                RTCPeerConnectionEvent::OnIceCandidateAdded(request, Err(err))
            }),
            Err(err) => {
                if !self.is_closed {
                    self.pipeline_context.event_outs.push_back(
                        RTCPeerConnectionEvent::OnIceCandidateErrorEvent(
                            RTCPeerConnectionIceErrorEvent {
                                candidate: RTCIceCandidateInit::default(),
                                error_text: err.to_string(),
                            },
                        ),
                    );
                }
                self.issue(Err(err), |request, err| {
                    RTCPeerConnectionEvent::OnIceCandidateAdded(request, Err(err))
                })
            }
        }
    }

    /// add_stream attaches a local stream. Only valid before negotiation
    /// started; attaching the same stream twice does nothing.
    pub fn add_stream(&mut self, stream: &MediaStream) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        if !self.negotiator.is_idle() {
            return Err(Error::ErrInvalidState(format!(
                "add_stream is not valid in state {}",
                self.negotiator.state()
            )));
        }
        if self
            .streams
            .iter()
            .any(|s| s.stream_id() == stream.stream_id())
        {
            return Ok(());
        }

        self.streams.push(stream.clone());
        self.pipeline_context
            .write_outs
            .push_back(EngineCommand::AddStream(stream.clone()));
        Ok(())
    }

    pub fn streams(&self) -> &[MediaStream] {
        &self.streams
    }

    /// Streams the remote peer attached, in arrival order.
    pub fn remote_streams(&self) -> &[MediaStream] {
        &self.remote_streams
    }

    fn add_remote_stream(&mut self, stream: MediaStream) {
        if self
            .remote_streams
            .iter()
            .any(|s| s.stream_id() == stream.stream_id())
        {
            trace!(
                "[{}] remote stream {} already known",
                self.id,
                stream.stream_id()
            );
            return;
        }

        debug!("[{}] remote stream {} added", self.id, stream.stream_id());
        self.remote_streams.push(stream.clone());
        self.pipeline_context
            .event_outs
            .push_back(RTCPeerConnectionEvent::OnRemoteStream(stream));
    }

    /// create_data_channel creates a new DataChannel object with the given label
    /// and optional DataChannelInit used to configure properties of the
    /// underlying channel such as data reliability.
    pub fn create_data_channel(
        &mut self,
        label: &str,
        options: Option<RTCDataChannelInit>,
    ) -> Result<RTCDataChannel<'_>> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }

        let init = options.unwrap_or_default();
        let id = self.data_channels.open(label, &init)?;
        debug!("[{}] open data channel {id} ({label})", self.id);
        self.pipeline_context
            .write_outs
            .push_back(EngineCommand::OpenChannel {
                channel: id,
                label: label.to_owned(),
                init,
            });

        Ok(RTCDataChannel {
            id,
            peer_connection: self,
        })
    }

    pub fn data_channel(&mut self, id: RTCDataChannelId) -> Option<RTCDataChannel<'_>> {
        if self.data_channels.get(id).is_some() {
            Some(RTCDataChannel {
                id,
                peer_connection: self,
            })
        } else {
            None
        }
    }

    /// close_data_channel starts closing one channel. The engine's close
    /// notification completes it.
    pub fn close_data_channel(&mut self, id: RTCDataChannelId) -> Result<()> {
        if self.is_closed {
            return Err(Error::ErrConnectionClosed);
        }
        if self.data_channels.close_channel(id) {
            self.pipeline_context
                .write_outs
                .push_back(EngineCommand::CloseChannel { channel: id });
        }
        self.collect_events();
        Ok(())
    }

    pub fn local_description(&self) -> Option<&RTCSessionDescription> {
        self.negotiator.local_description()
    }

    pub fn remote_description(&self) -> Option<&RTCSessionDescription> {
        self.negotiator.remote_description()
    }

    /// Candidates gathered in the current pass, in discovery order.
    pub fn local_candidates(&self) -> &[RTCIceCandidateInit] {
        self.gatherer.candidates()
    }

    /// Whether the current gathering pass has seen its end-of-candidates.
    pub fn is_gathering_complete(&self) -> bool {
        self.gatherer.is_complete()
    }

    pub fn negotiation_state(&self) -> RTCNegotiationState {
        self.negotiator.state()
    }

    pub fn signaling_state(&self) -> RTCSignalingState {
        self.negotiator.signaling_state()
    }

    pub fn ice_gathering_state(&self) -> RTCIceGatheringState {
        self.gatherer.state()
    }

    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.peer_connection_state
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    fn set_connection_state(&mut self, state: RTCPeerConnectionState) {
        if self.peer_connection_state == state {
            return;
        }
        if self.peer_connection_state == RTCPeerConnectionState::Closed {
            warn!("[{}] ignoring connection state {state} after close", self.id);
            return;
        }
        debug!(
            "[{}] connection state {} -> {state}",
            self.id, self.peer_connection_state
        );
        self.peer_connection_state = state;
        self.pipeline_context
            .event_outs
            .push_back(RTCPeerConnectionEvent::OnConnectionStateChangeEvent(state));
    }
}

impl sansio::Protocol<EngineEvent, (RTCDataChannelId, RTCDataChannelMessage), ()>
    for RTCPeerConnection
{
    type Rout = (RTCDataChannelId, RTCDataChannelMessage);
    type Wout = EngineCommand;
    type Eout = RTCPeerConnectionEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: EngineEvent) -> Result<()> {
        if self.is_closed {
            trace!("[{}] ignoring engine event after close: {msg:?}", self.id);
            return Ok(());
        }

        match msg {
            EngineEvent::OfferGenerated { request, result }
            | EngineEvent::AnswerGenerated { request, result } => {
                self.negotiator.on_generated(request, result);
            }
            EngineEvent::LocalDescriptionApplied { request, result } => {
                match self.negotiator.on_applied(request, result) {
                    Some(Ok(description)) => self.gatherer.on_local_applied(description),
                    Some(Err(err)) => self.gatherer.on_local_failed(err),
                    None => {}
                }
            }
            EngineEvent::RemoteDescriptionApplied { request, result } => {
                self.negotiator.on_applied(request, result);
            }
            EngineEvent::IceCandidateAdded { request, result } => {
                self.negotiator.on_candidate_added(request, result);
            }
            EngineEvent::IceCandidate(candidate) => self.gatherer.observe(candidate),
            EngineEvent::ConnectionStateChange(state) => self.set_connection_state(state),
            EngineEvent::ChannelOpen(id) => self.data_channels.handle_open(id),
            EngineEvent::ChannelError(id, err) => self.data_channels.handle_error(id, err),
            EngineEvent::ChannelClose(id) => self.data_channels.handle_close(id),
            EngineEvent::IncomingChannel {
                channel,
                label,
                init,
            } => {
                self.data_channels.accept(channel, label, init);
            }
            EngineEvent::Message { channel, message } => {
                if self.data_channels.receive(channel) {
                    self.pipeline_context
                        .read_outs
                        .push_back((channel, message));
                } else {
                    debug!("[{}] dropping message for data channel {channel}", self.id);
                }
            }
            EngineEvent::RemoteStream(stream) => self.add_remote_stream(stream),
        }

        self.dispatch();
        self.collect_events();
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.pipeline_context.read_outs.pop_front()
    }

    /// Sends on a data channel. Silently dropped unless the channel is open.
    fn handle_write(&mut self, msg: (RTCDataChannelId, RTCDataChannelMessage)) -> Result<()> {
        let (channel, message) = msg;
        if self.is_closed {
            return Ok(());
        }
        if self.data_channels.send(channel, &message)? {
            self.pipeline_context
                .write_outs
                .push_back(EngineCommand::Send { channel, message });
        }
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.pipeline_context.write_outs.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.pipeline_context.event_outs.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if !self.is_closed {
            self.gatherer.handle_timeout(now);
            self.collect_events();
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.gatherer.poll_timeout()
    }

    /// Tears the connection down. Every outstanding request, a pending
    /// finalization and every pending channel open complete with
    /// [`Error::ErrConnectionClosed`]. Calling it again does nothing.
    fn close(&mut self) -> Result<()> {
        if self.is_closed {
            return Ok(());
        }
        debug!("[{}] closing", self.id);

        self.negotiator.close();
        self.gatherer.close();
        self.data_channels.close_all();
        self.collect_events();

        self.set_connection_state(RTCPeerConnectionState::Closed);
        self.is_closed = true;
        self.pipeline_context.write_outs.push_back(EngineCommand::Close);
        Ok(())
    }
}
