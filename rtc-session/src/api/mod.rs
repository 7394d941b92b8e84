//! Async API over [`RTCPeerConnection`].
//!
//! Every [`PeerConnection`] is backed by one tokio task that exclusively owns
//! the sans-I/O core and its engine session. Handles talk to the task over a
//! channel, so they can be used from any task.
//!
//! ```no_run
//! use rtc_session::api::APIBuilder;
//! use rtc_session::peer_connection::configuration::RTCConfiguration;
//!
//! # async fn run() -> rtc_session::error::Result<()> {
//! let api = APIBuilder::new().build();
//! let offerer = api.new_peer_connection(RTCConfiguration::default())?;
//! let answerer = api.new_peer_connection(RTCConfiguration::default())?;
//!
//! let chat = offerer.create_data_channel("chat", None).await?;
//!
//! let offer = offerer.create_offer(None).await?;
//! offerer.set_local_description(offer).await?;
//! let offer = offerer.local_description_finalized().await?;
//!
//! answerer.set_remote_description(offer).await?;
//! let answer = answerer.create_answer(None).await?;
//! answerer.set_local_description(answer).await?;
//! let answer = answerer.local_description_finalized().await?;
//! offerer.set_remote_description(answer).await?;
//!
//! chat.ready().await?;
//! chat.send_text("hello")?;
//! # Ok(())
//! # }
//! ```

pub mod data_channel;
mod driver;
pub mod stream;

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};

pub use data_channel::DataChannel;
use driver::Driver;
pub use stream::{
    CandidateStream, IncomingDataChannels, MessageOnce, MessageStream, RemoteStreams,
};

use crate::data_channel::{RTCDataChannelId, RTCDataChannelInit, RTCDataChannelMessage};
use crate::engine::EngineFactory;
use crate::engine::loopback::LoopbackNetwork;
use crate::error::{Error, Result};
use crate::media_stream::MediaStream;
use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::configuration::{
    RTCAnswerOptions, RTCConfiguration, RTCOfferOptions,
};
use crate::peer_connection::sdp::{IntoSessionDescription, RTCSessionDescription};
use crate::peer_connection::state::{
    RTCIceGatheringState, RTCNegotiationState, RTCPeerConnectionState, RTCSignalingState,
};
use crate::peer_connection::transport::RTCIceCandidateInit;

type Reply<T> = oneshot::Sender<Result<T>>;

pub(crate) enum Request {
    AddStream(MediaStream, Reply<()>),
    CreateOffer(Option<RTCOfferOptions>, Reply<RTCSessionDescription>),
    CreateAnswer(Option<RTCAnswerOptions>, Reply<RTCSessionDescription>),
    SetLocalDescription(RTCSessionDescription, Reply<()>),
    SetRemoteDescription(RTCSessionDescription, Reply<()>),
    AddIceCandidate(RTCIceCandidateInit, Reply<()>),
    LocalDescriptionFinalized(Reply<RTCSessionDescription>),
    SubscribeCandidates(mpsc::UnboundedSender<RTCIceCandidateInit>),
    CreateDataChannel {
        label: String,
        init: Option<RTCDataChannelInit>,
        reply: Reply<DataChannel>,
    },
    Send {
        channel: RTCDataChannelId,
        message: RTCDataChannelMessage,
    },
    CloseDataChannel(RTCDataChannelId),
    Close,
}

/// What handles can observe without a round trip to the task.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Snapshot {
    pub(crate) connection_state: RTCPeerConnectionState,
    pub(crate) negotiation_state: RTCNegotiationState,
    pub(crate) signaling_state: RTCSignalingState,
    pub(crate) ice_gathering_state: RTCIceGatheringState,
    pub(crate) local_description: Option<RTCSessionDescription>,
    pub(crate) remote_description: Option<RTCSessionDescription>,
    pub(crate) closed: bool,
}

impl From<&RTCPeerConnection> for Snapshot {
    fn from(pc: &RTCPeerConnection) -> Self {
        Snapshot {
            connection_state: pc.connection_state(),
            negotiation_state: pc.negotiation_state(),
            signaling_state: pc.signaling_state(),
            ice_gathering_state: pc.ice_gathering_state(),
            local_description: pc.local_description().cloned(),
            remote_description: pc.remote_description().cloned(),
            closed: pc.is_closed(),
        }
    }
}

/// APIBuilder allows the creation of an [`API`] with a custom engine.
#[derive(Default)]
pub struct APIBuilder {
    engine_factory: Option<Arc<dyn EngineFactory>>,
}

impl APIBuilder {
    pub fn new() -> Self {
        APIBuilder::default()
    }

    /// with_engine_factory sets the engine peer connections are created on.
    /// Without one, every [`API`] gets its own [`LoopbackNetwork`].
    pub fn with_engine_factory(mut self, engine_factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = Some(engine_factory);
        self
    }

    pub fn build(self) -> API {
        API {
            engine_factory: self
                .engine_factory
                .unwrap_or_else(|| Arc::new(LoopbackNetwork::default())),
        }
    }
}

/// API creates peer connections sharing one engine.
pub struct API {
    engine_factory: Arc<dyn EngineFactory>,
}

impl API {
    /// new_peer_connection creates a connection and spawns the task that owns
    /// it. Must be called from within a tokio runtime.
    pub fn new_peer_connection(&self, configuration: RTCConfiguration) -> Result<PeerConnection> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| Error::Other(err.to_string()))?;

        let pc = RTCPeerConnection::new(configuration)?;
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let engine = self
            .engine_factory
            .create_session(pc.get_configuration(), engine_tx)?;

        let id = pc.id().to_owned();
        let max_message_size = pc.get_configuration().max_message_size();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (remote_streams_tx, remote_streams_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::from(&pc));

        let driver = Driver::new(
            pc,
            engine,
            request_tx.clone(),
            request_rx,
            engine_rx,
            incoming_tx,
            remote_streams_tx,
            snapshot_tx,
        );
        runtime.spawn(driver.run());

        Ok(PeerConnection {
            id,
            requests: request_tx,
            snapshot: snapshot_rx,
            incoming: Mutex::new(Some(incoming_rx)),
            remote_streams: Mutex::new(Some(remote_streams_rx)),
            max_message_size,
        })
    }
}

/// PeerConnection is the async handle of one connection. Dropping it closes
/// the connection.
pub struct PeerConnection {
    id: String,
    requests: mpsc::UnboundedSender<Request>,
    snapshot: watch::Receiver<Snapshot>,
    incoming: Mutex<Option<mpsc::UnboundedReceiver<DataChannel>>>,
    remote_streams: Mutex<Option<mpsc::UnboundedReceiver<MediaStream>>>,
    max_message_size: usize,
}

impl PeerConnection {
    async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(request(tx))
            .map_err(|_| Error::ErrConnectionClosed)?;
        rx.await.map_err(|_| Error::ErrConnectionClosed)?
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// add_stream attaches a local stream; only valid before negotiation.
    pub async fn add_stream(&self, stream: &MediaStream) -> Result<()> {
        let stream = stream.clone();
        self.call(|reply| Request::AddStream(stream, reply)).await
    }

    pub async fn create_offer(
        &self,
        options: Option<RTCOfferOptions>,
    ) -> Result<RTCSessionDescription> {
        self.call(|reply| Request::CreateOffer(options, reply)).await
    }

    pub async fn create_answer(
        &self,
        options: Option<RTCAnswerOptions>,
    ) -> Result<RTCSessionDescription> {
        self.call(|reply| Request::CreateAnswer(options, reply)).await
    }

    /// set_local_description commits the local description and starts a
    /// gathering pass; see [`local_description_finalized`](Self::local_description_finalized).
    pub async fn set_local_description(
        &self,
        description: impl IntoSessionDescription,
    ) -> Result<()> {
        let description = description.into_session_description()?;
        self.call(|reply| Request::SetLocalDescription(description, reply))
            .await
    }

    pub async fn set_remote_description(
        &self,
        description: impl IntoSessionDescription,
    ) -> Result<()> {
        let description = description.into_session_description()?;
        self.call(|reply| Request::SetRemoteDescription(description, reply))
            .await
    }

    /// add_ice_candidate hands a remote candidate to the engine. An empty
    /// `candidate` marks the remote end-of-candidates.
    pub async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.call(|reply| Request::AddIceCandidate(candidate, reply))
            .await
    }

    /// Resolves with the local description of the current gathering pass
    /// once it is final: with every candidate merged under the `complete`
    /// policy, as soon as it is applied under `trickle`.
    pub async fn local_description_finalized(&self) -> Result<RTCSessionDescription> {
        self.call(Request::LocalDescriptionFinalized).await
    }

    pub fn local_description(&self) -> Option<RTCSessionDescription> {
        self.snapshot.borrow().local_description.clone()
    }

    pub fn remote_description(&self) -> Option<RTCSessionDescription> {
        self.snapshot.borrow().remote_description.clone()
    }

    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.snapshot.borrow().connection_state
    }

    pub fn negotiation_state(&self) -> RTCNegotiationState {
        self.snapshot.borrow().negotiation_state
    }

    pub fn signaling_state(&self) -> RTCSignalingState {
        self.snapshot.borrow().signaling_state
    }

    pub fn ice_gathering_state(&self) -> RTCIceGatheringState {
        self.snapshot.borrow().ice_gathering_state
    }

    /// Resolves once the connection is connected. Fails if it fails or
    /// closes first.
    pub async fn connected(&self) -> Result<()> {
        let mut snapshot = self.snapshot.clone();
        loop {
            {
                let current = snapshot.borrow_and_update();
                if current.closed {
                    return Err(Error::ErrConnectionClosed);
                }
                match current.connection_state {
                    RTCPeerConnectionState::Connected => return Ok(()),
                    RTCPeerConnectionState::Failed => {
                        return Err(Error::ErrEngine(format!("[{}] connection failed", self.id)));
                    }
                    RTCPeerConnectionState::Closed => return Err(Error::ErrConnectionClosed),
                    _ => {}
                }
            }
            if snapshot.changed().await.is_err() {
                return Err(Error::ErrConnectionClosed);
            }
        }
    }

    /// Local candidates of the current gathering pass.
    pub fn candidates(&self) -> CandidateStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.requests.send(Request::SubscribeCandidates(tx));
        CandidateStream { rx }
    }

    /// create_data_channel returns a handle in the `connecting` state.
    pub async fn create_data_channel(
        &self,
        label: &str,
        init: Option<RTCDataChannelInit>,
    ) -> Result<DataChannel> {
        let label = label.to_owned();
        self.call(|reply| Request::CreateDataChannel { label, init, reply })
            .await
    }

    /// open_data_channel resolves once the channel is open.
    pub async fn open_data_channel(
        &self,
        label: &str,
        init: Option<RTCDataChannelInit>,
    ) -> Result<DataChannel> {
        let data_channel = self.create_data_channel(label, init).await?;
        data_channel.ready().await?;
        Ok(data_channel)
    }

    /// Channels opened by the remote peer. Can only be taken once.
    pub fn incoming_data_channels(&self) -> Result<IncomingDataChannels> {
        let rx = self.incoming.lock()?.take().ok_or(Error::ErrAlreadySubscribed)?;
        Ok(IncomingDataChannels { rx })
    }

    /// Media streams the remote peer attached, announced once the connection
    /// is up. Can only be taken once.
    pub fn remote_streams(&self) -> Result<RemoteStreams> {
        let rx = self
            .remote_streams
            .lock()?
            .take()
            .ok_or(Error::ErrAlreadySubscribed)?;
        Ok(RemoteStreams { rx })
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn is_closed(&self) -> bool {
        self.snapshot.borrow().closed || self.requests.is_closed()
    }

    /// Closes the connection. Every pending operation resolves with
    /// [`Error::ErrConnectionClosed`]; calling it again does nothing.
    pub fn close(&self) {
        let _ = self.requests.send(Request::Close);
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.close();
    }
}
