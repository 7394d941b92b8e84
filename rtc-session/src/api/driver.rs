use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, trace, warn};
use sansio::Protocol;
use tokio::sync::{mpsc, watch};

use super::data_channel::{ChannelShared, DataChannel};
use super::{Reply, Request, Snapshot};
use crate::data_channel::{RTCDataChannelId, RTCDataChannelInit, RTCDataChannelState};
use crate::engine::{Engine, EngineEvent, RequestId};
use crate::error::{Error, Result};
use crate::media_stream::MediaStream;
use crate::peer_connection::RTCPeerConnection;
use crate::peer_connection::event::{RTCDataChannelEvent, RTCPeerConnectionEvent};
use crate::peer_connection::sdp::RTCSessionDescription;
use crate::peer_connection::transport::RTCIceCandidateInit;

/// The task owning one connection and its engine session.
pub(super) struct Driver {
    pc: RTCPeerConnection,
    engine: Box<dyn Engine>,
    request_tx: mpsc::UnboundedSender<Request>,
    requests: mpsc::UnboundedReceiver<Request>,
    engine_events: mpsc::UnboundedReceiver<EngineEvent>,
    incoming: Option<mpsc::UnboundedSender<DataChannel>>,
    remote_streams: Option<mpsc::UnboundedSender<MediaStream>>,
    snapshot: watch::Sender<Snapshot>,

    descriptions: HashMap<RequestId, Reply<RTCSessionDescription>>,
    acks: HashMap<RequestId, Reply<()>>,
    finalized: Option<Result<RTCSessionDescription>>,
    finalized_waiters: Vec<Reply<RTCSessionDescription>>,
    candidate_subscribers: Vec<mpsc::UnboundedSender<RTCIceCandidateInit>>,
    channels: HashMap<RTCDataChannelId, Arc<ChannelShared>>,
}

impl Driver {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        pc: RTCPeerConnection,
        engine: Box<dyn Engine>,
        request_tx: mpsc::UnboundedSender<Request>,
        requests: mpsc::UnboundedReceiver<Request>,
        engine_events: mpsc::UnboundedReceiver<EngineEvent>,
        incoming: mpsc::UnboundedSender<DataChannel>,
        remote_streams: mpsc::UnboundedSender<MediaStream>,
        snapshot: watch::Sender<Snapshot>,
    ) -> Self {
        Driver {
            pc,
            engine,
            request_tx,
            requests,
            engine_events,
            incoming: Some(incoming),
            remote_streams: Some(remote_streams),
            snapshot,
            descriptions: HashMap::new(),
            acks: HashMap::new(),
            finalized: None,
            finalized_waiters: vec![],
            candidate_subscribers: vec![],
            channels: HashMap::new(),
        }
    }

    pub(super) async fn run(mut self) {
        trace!("[{}] driver started", self.pc.id());
        loop {
            let deadline = self.pc.poll_timeout();
            let timer = async move {
                match deadline {
                    Some(deadline) => {
                        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                request = self.requests.recv() => match request {
                    Some(Request::Close) | None => break,
                    Some(request) => self.handle_request(request),
                },
                Some(event) = self.engine_events.recv() => {
                    trace!("[{}] engine event {event:?}", self.pc.id());
                    if let Err(err) = self.pc.handle_read(event) {
                        warn!("[{}] engine event rejected: {err}", self.pc.id());
                    }
                }
                _ = timer => {
                    if let Err(err) = self.pc.handle_timeout(Instant::now()) {
                        warn!("[{}] handle_timeout: {err}", self.pc.id());
                    }
                }
            }

            if let Err(err) = self.pump() {
                error!("[{}] engine failure, closing: {err}", self.pc.id());
                break;
            }
        }

        self.shutdown();
        trace!("[{}] driver stopped", self.pc.id());
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::AddStream(stream, reply) => {
                let _ = reply.send(self.pc.add_stream(&stream));
            }
            Request::CreateOffer(options, reply) => {
                let request = self.pc.create_offer(options);
                self.descriptions.insert(request, reply);
            }
            Request::CreateAnswer(options, reply) => {
                let request = self.pc.create_answer(options);
                self.descriptions.insert(request, reply);
            }
            Request::SetLocalDescription(description, reply) => {
                let request = self.pc.set_local_description(description);
                self.acks.insert(request, reply);
            }
            Request::SetRemoteDescription(description, reply) => {
                let request = self.pc.set_remote_description(description);
                self.acks.insert(request, reply);
            }
            Request::AddIceCandidate(candidate, reply) => {
                let request = self.pc.add_ice_candidate(candidate);
                self.acks.insert(request, reply);
            }
            Request::LocalDescriptionFinalized(reply) => {
                if let Some(finalized) = &self.finalized {
                    let _ = reply.send(finalized.clone());
                } else if self.pc.is_closed() {
                    let _ = reply.send(Err(Error::ErrConnectionClosed));
                } else {
                    self.finalized_waiters.push(reply);
                }
            }
            Request::SubscribeCandidates(subscriber) => {
                for candidate in self.pc.local_candidates() {
                    let _ = subscriber.send(candidate.clone());
                }
                if !self.pc.is_gathering_complete() && !self.pc.is_closed() {
                    self.candidate_subscribers.push(subscriber);
                }
            }
            Request::CreateDataChannel { label, init, reply } => {
                let _ = reply.send(self.create_data_channel(&label, init));
            }
            Request::Send { channel, message } => {
                if let Err(err) = self.pc.handle_write((channel, message)) {
                    debug!("[{}] send on data channel {channel}: {err}", self.pc.id());
                }
            }
            Request::CloseDataChannel(channel) => {
                if let Err(err) = self.pc.close_data_channel(channel) {
                    debug!("[{}] close data channel {channel}: {err}", self.pc.id());
                }
            }
            Request::Close => {}
        }
    }

    fn create_data_channel(
        &mut self,
        label: &str,
        init: Option<RTCDataChannelInit>,
    ) -> Result<DataChannel> {
        let protocol = init
            .as_ref()
            .map(|init| init.protocol.clone())
            .unwrap_or_default();
        let id = self.pc.create_data_channel(label, init)?.id();
        Ok(self.register_channel(id, label.to_owned(), protocol))
    }

    fn register_channel(
        &mut self,
        id: RTCDataChannelId,
        label: String,
        protocol: String,
    ) -> DataChannel {
        let shared = Arc::new(ChannelShared::new(id, label, protocol));
        self.channels.insert(id, Arc::clone(&shared));
        DataChannel::new(
            shared,
            self.request_tx.clone(),
            self.pc.get_configuration().max_message_size(),
        )
    }

    /// Drains everything the core produced: commands go to the engine,
    /// messages and events to the handles.
    fn pump(&mut self) -> Result<()> {
        while let Some(command) = self.pc.poll_write() {
            self.engine.handle_command(command)?;
        }
        while let Some((channel, message)) = self.pc.poll_read() {
            if let Some(shared) = self.channels.get(&channel) {
                shared.deliver(message);
            }
        }
        // states first, so a resumed caller already observes them
        self.publish();
        while let Some(event) = self.pc.poll_event() {
            self.handle_event(event);
        }
        Ok(())
    }

    fn handle_event(&mut self, event: RTCPeerConnectionEvent) {
        match event {
            RTCPeerConnectionEvent::OnOfferCreated(request, result)
            | RTCPeerConnectionEvent::OnAnswerCreated(request, result) => {
                match self.descriptions.remove(&request) {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => debug!("[{}] no waiter for request {request}", self.pc.id()),
                }
            }
            RTCPeerConnectionEvent::OnLocalDescriptionSet(request, result)
            | RTCPeerConnectionEvent::OnRemoteDescriptionSet(request, result)
            | RTCPeerConnectionEvent::OnIceCandidateAdded(request, result) => {
                match self.acks.remove(&request) {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => debug!("[{}] no waiter for request {request}", self.pc.id()),
                }
            }
            RTCPeerConnectionEvent::OnLocalDescriptionFinalized(result) => {
                for reply in self.finalized_waiters.drain(..) {
                    let _ = reply.send(result.clone());
                }
                self.finalized = Some(result);
            }
            RTCPeerConnectionEvent::OnIceGatheringPassStarted => {
                self.finalized = None;
            }
            RTCPeerConnectionEvent::OnIceCandidateEvent(event) => {
                if event.is_end_of_candidates() {
                    self.candidate_subscribers.clear();
                } else if let Some(candidate) = event.candidate {
                    self.candidate_subscribers
                        .retain(|subscriber| subscriber.send(candidate.clone()).is_ok());
                }
            }
            RTCPeerConnectionEvent::OnIceCandidateErrorEvent(event) => {
                warn!(
                    "[{}] remote candidate {:?} rejected: {}",
                    self.pc.id(),
                    event.candidate.candidate,
                    event.error_text
                );
            }
            RTCPeerConnectionEvent::OnDataChannel(event) => self.handle_data_channel_event(event),
            RTCPeerConnectionEvent::OnRemoteStream(stream) => {
                if let Some(remote_streams) = &self.remote_streams {
                    let _ = remote_streams.send(stream);
                }
            }
            RTCPeerConnectionEvent::OnIceGatheringStateChangeEvent(_)
            | RTCPeerConnectionEvent::OnSignalingStateChangeEvent(_)
            | RTCPeerConnectionEvent::OnNegotiationStateChangeEvent(_)
            | RTCPeerConnectionEvent::OnConnectionStateChangeEvent(_) => {}
        }
    }

    fn handle_data_channel_event(&mut self, event: RTCDataChannelEvent) {
        match event {
            RTCDataChannelEvent::OnIncoming(id, label) => {
                let protocol = self
                    .pc
                    .data_channel(id)
                    .and_then(|dc| dc.protocol().ok())
                    .unwrap_or_default();
                let data_channel = self.register_channel(id, label, protocol);
                if let Some(incoming) = &self.incoming {
                    let _ = incoming.send(data_channel);
                }
            }
            RTCDataChannelEvent::OnOpen(id) => {
                if let Some(shared) = self.channels.get(&id) {
                    shared.set_state(RTCDataChannelState::Open);
                }
            }
            RTCDataChannelEvent::OnError(id, err) => {
                if let Some(shared) = self.channels.get(&id) {
                    shared.set_error(err);
                }
            }
            RTCDataChannelEvent::OnClosing(id) => {
                if let Some(shared) = self.channels.get(&id) {
                    shared.set_state(RTCDataChannelState::Closing);
                }
            }
            RTCDataChannelEvent::OnClose(id) => {
                if let Some(shared) = self.channels.remove(&id) {
                    shared.close();
                }
            }
        }
    }

    fn publish(&mut self) {
        let next = Snapshot::from(&self.pc);
        self.snapshot.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Closes the core and resolves everything still waiting on it.
    fn shutdown(&mut self) {
        if let Err(err) = self.pc.close() {
            warn!("[{}] close: {err}", self.pc.id());
        }
        while let Some(command) = self.pc.poll_write() {
            if let Err(err) = self.engine.handle_command(command) {
                warn!("[{}] engine failed during close: {err}", self.pc.id());
            }
        }
        while let Some(event) = self.pc.poll_event() {
            self.handle_event(event);
        }

        for (_, reply) in self.descriptions.drain() {
            let _ = reply.send(Err(Error::ErrConnectionClosed));
        }
        for (_, reply) in self.acks.drain() {
            let _ = reply.send(Err(Error::ErrConnectionClosed));
        }
        for reply in self.finalized_waiters.drain(..) {
            let _ = reply.send(Err(Error::ErrConnectionClosed));
        }
        self.candidate_subscribers.clear();
        self.incoming = None;
        self.remote_streams = None;
        for (_, shared) in self.channels.drain() {
            shared.close();
        }

        // Requests that raced with the close.
        self.requests.close();
        while let Ok(request) = self.requests.try_recv() {
            self.reject(request);
        }

        self.publish();
    }

    fn reject(&self, request: Request) {
        match request {
            Request::AddStream(_, reply)
            | Request::SetLocalDescription(_, reply)
            | Request::SetRemoteDescription(_, reply)
            | Request::AddIceCandidate(_, reply) => {
                let _ = reply.send(Err(Error::ErrConnectionClosed));
            }
            Request::CreateOffer(_, reply)
            | Request::CreateAnswer(_, reply)
            | Request::LocalDescriptionFinalized(reply) => {
                let _ = reply.send(Err(Error::ErrConnectionClosed));
            }
            Request::CreateDataChannel { reply, .. } => {
                let _ = reply.send(Err(Error::ErrConnectionClosed));
            }
            Request::SubscribeCandidates(_)
            | Request::Send { .. }
            | Request::CloseDataChannel(_)
            | Request::Close => {}
        }
    }
}

/// A runtime shutting down drops the task without letting it finish.
impl Drop for Driver {
    fn drop(&mut self) {
        if !self.pc.is_closed() {
            self.shutdown();
        }
    }
}
