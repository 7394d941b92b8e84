//! An in-process engine pairing peer connections of the same
//! [`LoopbackNetwork`].
//!
//! Generated descriptions carry an `a=x-loopback-endpoint:<id>` attribute.
//! Once both sides applied each other's description they report
//! `connected`, attached media streams and data channels opened so far are
//! announced to the peer and messages are delivered in order. No packets are sent anywhere.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use super::{Engine, EngineCommand, EngineEvent, EngineEventSender, EngineFactory};
use crate::data_channel::{RTCDataChannelId, RTCDataChannelInit};
use crate::error::{Error, Result};
use crate::media_stream::{MediaStream, MediaStreamTrackKind};
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::sdp::{RTCSdpType, RTCSessionDescription};
use crate::peer_connection::state::RTCPeerConnectionState;
use crate::peer_connection::transport::RTCIceCandidateInit;

const ENDPOINT_ATTRIBUTE: &str = "a=x-loopback-endpoint:";
const BASE_PORT: u32 = 40000;
const HOST_PRIORITY: u32 = 2130706431;

/// How the end of a gathering pass is signalled.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopbackEndOfCandidates {
    /// A `None` candidate.
    #[default]
    Null,
    /// A candidate whose `candidate` string is empty.
    EmptyCandidate,
}

#[derive(Debug, Clone)]
pub struct LoopbackOptions {
    /// Host candidates emitted per gathering pass.
    pub candidates_per_pass: usize,
    pub end_of_candidates: LoopbackEndOfCandidates,
    /// When false, a gathering pass never ends on its own.
    pub signal_end_of_candidates: bool,
    /// Data channels with these labels fail to open.
    pub rejected_labels: Vec<String>,
}

impl Default for LoopbackOptions {
    fn default() -> Self {
        LoopbackOptions {
            candidates_per_pass: 3,
            end_of_candidates: LoopbackEndOfCandidates::Null,
            signal_end_of_candidates: true,
            rejected_labels: vec![],
        }
    }
}

type EndpointId = u64;

#[derive(Debug)]
struct LoopbackChannel {
    label: String,
    init: RTCDataChannelInit,
    /// Channel id on the peer once announced.
    peer: Option<RTCDataChannelId>,
}

struct Endpoint {
    events: EngineEventSender,
    streams: Vec<MediaStream>,
    local: Option<RTCSessionDescription>,
    remote: Option<RTCSessionDescription>,
    peer: Option<EndpointId>,
    connected: bool,
    channels: HashMap<RTCDataChannelId, LoopbackChannel>,
    next_incoming_id: RTCDataChannelId,
}

impl Endpoint {
    fn emit(&self, event: EngineEvent) {
        if let Err(err) = self.events.send(event) {
            trace!("loopback event dropped, connection gone: {:?}", err.0);
        }
    }

    fn allocate_incoming_id(&mut self) -> RTCDataChannelId {
        while self.channels.contains_key(&self.next_incoming_id) {
            self.next_incoming_id = self.next_incoming_id.wrapping_add(2);
        }
        let id = self.next_incoming_id;
        self.next_incoming_id = self.next_incoming_id.wrapping_add(2);
        id
    }
}

#[derive(Default)]
struct NetworkInner {
    next_endpoint: EndpointId,
    endpoints: HashMap<EndpointId, Endpoint>,
}

/// A set of loopback endpoints that can reach each other.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<Mutex<NetworkInner>>,
    options: LoopbackOptions,
}

impl LoopbackNetwork {
    pub fn new(options: LoopbackOptions) -> Self {
        LoopbackNetwork {
            inner: Arc::new(Mutex::new(NetworkInner::default())),
            options,
        }
    }

    /// Number of sessions that have not been closed.
    pub fn endpoint_count(&self) -> Result<usize> {
        Ok(self.inner.lock()?.endpoints.len())
    }
}

impl EngineFactory for LoopbackNetwork {
    fn create_session(
        &self,
        config: &RTCConfiguration,
        events: EngineEventSender,
    ) -> Result<Box<dyn Engine>> {
        let mut inner = self.inner.lock()?;
        let endpoint = inner.next_endpoint;
        inner.next_endpoint += 1;
        inner.endpoints.insert(
            endpoint,
            Endpoint {
                events,
                streams: vec![],
                local: None,
                remote: None,
                peer: None,
                connected: false,
                channels: HashMap::new(),
                next_incoming_id: 1,
            },
        );
        debug!(
            "loopback endpoint {endpoint} created ({} ice server(s) ignored)",
            config.ice_servers().len()
        );

        Ok(Box::new(LoopbackEngine {
            endpoint,
            network: Arc::clone(&self.inner),
            options: self.options.clone(),
        }))
    }
}

struct LoopbackEngine {
    endpoint: EndpointId,
    network: Arc<Mutex<NetworkInner>>,
    options: LoopbackOptions,
}

fn build_sdp(endpoint: EndpointId, kinds: &[String]) -> String {
    let mut sdp = format!(
        "v=0\r\no=- {} 1 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n{ENDPOINT_ATTRIBUTE}{endpoint}\r\n",
        1000 + endpoint
    );
    for (mid, kind) in kinds.iter().enumerate() {
        let media = match kind.as_str() {
            "audio" => "m=audio 9 UDP/TLS/RTP/SAVPF 111",
            "video" => "m=video 9 UDP/TLS/RTP/SAVPF 96",
            _ => "m=application 9 UDP/DTLS/SCTP webrtc-datachannel",
        };
        sdp.push_str(&format!("{media}\r\nc=IN IP4 0.0.0.0\r\na=mid:{mid}\r\n"));
    }
    sdp
}

fn endpoint_of(description: &RTCSessionDescription) -> Option<EndpointId> {
    description
        .sdp
        .lines()
        .find_map(|line| line.trim_end().strip_prefix(ENDPOINT_ATTRIBUTE))
        .and_then(|id| id.parse().ok())
}

impl LoopbackEngine {
    fn offer_kinds(endpoint: &Endpoint, audio: bool, video: bool) -> Vec<String> {
        let has_track = |kind: MediaStreamTrackKind| {
            endpoint
                .streams
                .iter()
                .any(|s| s.get_tracks().any(|t| t.kind() == kind))
        };

        let mut kinds = vec![];
        if audio || has_track(MediaStreamTrackKind::Audio) {
            kinds.push(MediaStreamTrackKind::Audio.to_string());
        }
        if video || has_track(MediaStreamTrackKind::Video) {
            kinds.push(MediaStreamTrackKind::Video.to_string());
        }
        kinds.push("application".to_owned());
        kinds
    }

    fn host_candidates(&self) -> Vec<Option<RTCIceCandidateInit>> {
        let mut candidates: Vec<Option<RTCIceCandidateInit>> = (0..self.options.candidates_per_pass)
            .map(|n| {
                let port = BASE_PORT + (self.endpoint as u32 % 1000) * 10 + n as u32;
                Some(RTCIceCandidateInit {
                    candidate: format!(
                        "candidate:{n} 1 udp {HOST_PRIORITY} 127.0.0.1 {port} typ host"
                    ),
                    sdp_mid: Some("0".to_owned()),
                    sdp_mline_index: Some(0),
                    ..Default::default()
                })
            })
            .collect();

        if self.options.signal_end_of_candidates {
            candidates.push(match self.options.end_of_candidates {
                LoopbackEndOfCandidates::Null => None,
                LoopbackEndOfCandidates::EmptyCandidate => Some(RTCIceCandidateInit::default()),
            });
        }
        candidates
    }

    fn apply_remote(
        &self,
        inner: &mut NetworkInner,
        description: &RTCSessionDescription,
    ) -> Result<EndpointId> {
        let peer = endpoint_of(description).ok_or_else(|| {
            Error::ErrNegotiation("remote description has no loopback endpoint".to_owned())
        })?;
        if peer == self.endpoint || !inner.endpoints.contains_key(&peer) {
            return Err(Error::ErrNegotiation(format!(
                "unknown loopback endpoint {peer}"
            )));
        }

        let me = self.me(inner)?;
        if description.sdp_type.is_answer() {
            let offered = me.local.as_ref().map(|d| d.media_kinds().len()).unwrap_or(0);
            let answered = description.media_kinds().len();
            if offered != answered {
                return Err(Error::ErrNegotiation(format!(
                    "answer has {answered} media section(s), offer has {offered}"
                )));
            }
        }

        me.remote = Some(description.clone());
        me.peer = Some(peer);
        Ok(peer)
    }

    fn me<'a>(&self, inner: &'a mut NetworkInner) -> Result<&'a mut Endpoint> {
        inner
            .endpoints
            .get_mut(&self.endpoint)
            .ok_or(Error::ErrConnectionClosed)
    }

    fn try_connect(&self, inner: &mut NetworkInner) -> Result<()> {
        let me = self.me(inner)?;
        let Some(peer) = me.peer else {
            return Ok(());
        };
        if me.connected || me.local.is_none() {
            return Ok(());
        }

        let ready = inner.endpoints.get(&peer).is_some_and(|p| {
            p.local.is_some() && p.peer == Some(self.endpoint) && !p.connected
        });
        if !ready {
            return Ok(());
        }

        for id in [self.endpoint, peer] {
            if let Some(endpoint) = inner.endpoints.get_mut(&id) {
                endpoint.connected = true;
                endpoint.emit(EngineEvent::ConnectionStateChange(
                    RTCPeerConnectionState::Connecting,
                ));
                endpoint.emit(EngineEvent::ConnectionStateChange(
                    RTCPeerConnectionState::Connected,
                ));
            }
        }
        debug!("loopback endpoints {} and {peer} connected", self.endpoint);

        announce_streams(inner, self.endpoint, peer);
        announce_streams(inner, peer, self.endpoint);
        announce_channels(inner, self.endpoint, peer);
        announce_channels(inner, peer, self.endpoint);
        Ok(())
    }
}

/// Hands every stream attached on `from` to `to` as a remote stream.
fn announce_streams(inner: &NetworkInner, from: EndpointId, to: EndpointId) {
    let (Some(local), Some(remote)) = (inner.endpoints.get(&from), inner.endpoints.get(&to)) else {
        return;
    };
    for stream in &local.streams {
        trace!(
            "loopback endpoint {from} announces stream {} to {to}",
            stream.stream_id()
        );
        remote.emit(EngineEvent::RemoteStream(stream.clone()));
    }
}

/// Announces every not yet announced channel of `from` to `to`.
fn announce_channels(inner: &mut NetworkInner, from: EndpointId, to: EndpointId) {
    let pending: Vec<(RTCDataChannelId, String, RTCDataChannelInit)> = inner
        .endpoints
        .get(&from)
        .map(|endpoint| {
            let mut pending: Vec<_> = endpoint
                .channels
                .iter()
                .filter(|(_, channel)| channel.peer.is_none())
                .map(|(id, channel)| (*id, channel.label.clone(), channel.init.clone()))
                .collect();
            pending.sort_by_key(|(id, _, _)| *id);
            pending
        })
        .unwrap_or_default();

    for (id, label, init) in pending {
        let Some(remote) = inner.endpoints.get_mut(&to) else {
            return;
        };
        let remote_id = remote.allocate_incoming_id();
        remote.channels.insert(
            remote_id,
            LoopbackChannel {
                label: label.clone(),
                init: init.clone(),
                peer: Some(id),
            },
        );
        remote.emit(EngineEvent::IncomingChannel {
            channel: remote_id,
            label,
            init,
        });
        remote.emit(EngineEvent::ChannelOpen(remote_id));

        if let Some(local) = inner.endpoints.get_mut(&from) {
            if let Some(channel) = local.channels.get_mut(&id) {
                channel.peer = Some(remote_id);
            }
            local.emit(EngineEvent::ChannelOpen(id));
        }
    }
}

impl Engine for LoopbackEngine {
    fn handle_command(&mut self, command: EngineCommand) -> Result<()> {
        trace!("loopback endpoint {}: {command:?}", self.endpoint);
        let mut guard = self.network.lock()?;
        let inner = &mut *guard;

        match command {
            EngineCommand::AddStream(stream) => {
                self.me(inner)?.streams.push(stream);
            }
            EngineCommand::GenerateOffer { request, options } => {
                let me = self.me(inner)?;
                let kinds = Self::offer_kinds(
                    me,
                    options.offer_to_receive_audio,
                    options.offer_to_receive_video,
                );
                let result = RTCSessionDescription::offer(build_sdp(self.endpoint, &kinds));
                me.emit(EngineEvent::OfferGenerated { request, result });
            }
            EngineCommand::GenerateAnswer { request, .. } => {
                let me = self.me(inner)?;
                let result = match &me.remote {
                    Some(remote) if remote.sdp_type == RTCSdpType::Offer => {
                        RTCSessionDescription::answer(build_sdp(
                            self.endpoint,
                            &remote.media_kinds(),
                        ))
                    }
                    _ => Err(Error::ErrNegotiation("no remote offer to answer".to_owned())),
                };
                me.emit(EngineEvent::AnswerGenerated { request, result });
            }
            EngineCommand::ApplyLocalDescription {
                request,
                description,
            } => {
                let candidates = self.host_candidates();
                let me = self.me(inner)?;
                me.local = Some(description);
                me.emit(EngineEvent::LocalDescriptionApplied {
                    request,
                    result: Ok(()),
                });
                for candidate in candidates {
                    me.emit(EngineEvent::IceCandidate(candidate));
                }
                self.try_connect(inner)?;
            }
            EngineCommand::ApplyRemoteDescription {
                request,
                description,
            } => {
                let result = self.apply_remote(inner, &description).map(|_| ());
                let applied = result.is_ok();
                self.me(inner)?
                    .emit(EngineEvent::RemoteDescriptionApplied { request, result });
                if applied {
                    self.try_connect(inner)?;
                }
            }
            EngineCommand::AddIceCandidate { request, .. } => {
                let me = self.me(inner)?;
                let result = if me.remote.is_some() {
                    Ok(())
                } else {
                    Err(Error::ErrNoRemoteDescription)
                };
                me.emit(EngineEvent::IceCandidateAdded { request, result });
            }
            EngineCommand::OpenChannel {
                channel,
                label,
                init,
            } => {
                let me = self.me(inner)?;
                if self.options.rejected_labels.contains(&label) {
                    me.emit(EngineEvent::ChannelError(
                        channel,
                        Error::ErrDataChannelOpen(label),
                    ));
                    return Ok(());
                }
                me.channels.insert(
                    channel,
                    LoopbackChannel {
                        label,
                        init,
                        peer: None,
                    },
                );
                if let Some(peer) = me.peer.filter(|_| me.connected) {
                    announce_channels(inner, self.endpoint, peer);
                }
            }
            EngineCommand::Send { channel, message } => {
                let me = self.me(inner)?;
                let target = me
                    .peer
                    .zip(me.channels.get(&channel).and_then(|c| c.peer));
                match target.and_then(|(peer, id)| inner.endpoints.get(&peer).map(|p| (p, id))) {
                    Some((peer, id)) => peer.emit(EngineEvent::Message {
                        channel: id,
                        message,
                    }),
                    None => debug!("loopback send on unlinked data channel {channel}"),
                }
            }
            EngineCommand::CloseChannel { channel } => {
                let me = self.me(inner)?;
                let removed = me.channels.remove(&channel);
                me.emit(EngineEvent::ChannelClose(channel));
                let peer = me.peer;
                if let (Some(peer), Some(remote_id)) = (peer, removed.and_then(|c| c.peer)) {
                    if let Some(remote) = inner.endpoints.get_mut(&peer) {
                        remote.channels.remove(&remote_id);
                        remote.emit(EngineEvent::ChannelClose(remote_id));
                    }
                }
            }
            EngineCommand::Close => {
                let Some(me) = inner.endpoints.remove(&self.endpoint) else {
                    return Ok(());
                };
                if let Some(remote) = me.peer.and_then(|peer| inner.endpoints.get_mut(&peer)) {
                    let mut closed: Vec<RTCDataChannelId> =
                        me.channels.values().filter_map(|c| c.peer).collect();
                    closed.sort_unstable();
                    for id in closed {
                        remote.channels.remove(&id);
                        remote.emit(EngineEvent::ChannelClose(id));
                    }
                    if remote.connected {
                        remote.connected = false;
                        remote.emit(EngineEvent::ConnectionStateChange(
                            RTCPeerConnectionState::Disconnected,
                        ));
                    }
                }
                debug!("loopback endpoint {} closed", self.endpoint);
            }
        }

        Ok(())
    }
}
