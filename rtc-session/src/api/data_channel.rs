use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use log::trace;
use tokio::sync::{mpsc, oneshot, watch};

use super::Request;
use super::stream::{MessageOnce, MessageStream};
use crate::data_channel::{RTCDataChannelId, RTCDataChannelMessage, RTCDataChannelState};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub(crate) struct ChannelStatus {
    pub(crate) state: RTCDataChannelState,
    /// Why the channel failed, when it did.
    pub(crate) error: Option<Error>,
}

/// Where inbound messages go. Messages arriving while nobody listens wait in
/// `backlog` for the first subscription.
#[derive(Default)]
struct Inbox {
    subscribers: Vec<mpsc::UnboundedSender<RTCDataChannelMessage>>,
    once: Vec<oneshot::Sender<Result<RTCDataChannelMessage>>>,
    backlog: VecDeque<RTCDataChannelMessage>,
}

impl Inbox {
    fn deliver(&mut self, message: RTCDataChannelMessage) {
        let mut delivered = false;
        for waiter in self.once.drain(..) {
            delivered |= waiter.send(Ok(message.clone())).is_ok();
        }
        self.subscribers
            .retain(|subscriber| subscriber.send(message.clone()).is_ok());
        if !delivered && self.subscribers.is_empty() {
            self.backlog.push_back(message);
        }
    }
}

/// State of one channel shared between its handles and the connection task.
pub(crate) struct ChannelShared {
    id: RTCDataChannelId,
    label: String,
    protocol: String,
    status: watch::Sender<ChannelStatus>,
    inbox: Mutex<Inbox>,
}

impl ChannelShared {
    pub(crate) fn new(id: RTCDataChannelId, label: String, protocol: String) -> Self {
        ChannelShared {
            id,
            label,
            protocol,
            status: watch::Sender::new(ChannelStatus::default()),
            inbox: Mutex::new(Inbox::default()),
        }
    }

    fn is_closed(&self) -> bool {
        self.status.borrow().state == RTCDataChannelState::Closed
    }

    pub(crate) fn set_state(&self, state: RTCDataChannelState) {
        self.status.send_modify(|status| status.state = state);
    }

    pub(crate) fn set_error(&self, error: Error) {
        self.status.send_modify(|status| status.error = Some(error));
    }

    pub(crate) fn deliver(&self, message: RTCDataChannelMessage) {
        match self.inbox.lock() {
            Ok(mut inbox) => inbox.deliver(message),
            Err(err) => trace!("dropping message on data channel {}: {err}", self.id),
        }
    }

    fn subscribe(&self) -> MessageStream {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut inbox) = self.inbox.lock() {
            for message in inbox.backlog.drain(..) {
                let _ = tx.send(message);
            }
            // close() marks the state before it clears subscribers
            if !self.is_closed() {
                inbox.subscribers.push(tx);
            }
        }
        MessageStream { rx }
    }

    fn subscribe_once(&self) -> MessageOnce {
        let (tx, rx) = oneshot::channel();
        match self.inbox.lock() {
            Ok(mut inbox) => {
                if let Some(message) = inbox.backlog.pop_front() {
                    let _ = tx.send(Ok(message));
                } else if self.is_closed() {
                    let _ = tx.send(Err(Error::ErrDataChannelClosed));
                } else {
                    inbox.once.push(tx);
                }
            }
            Err(err) => {
                let _ = tx.send(Err(Error::from(err)));
            }
        }
        MessageOnce { rx }
    }

    /// Ends every subscription; the channel is gone. Undelivered messages
    /// stay readable.
    pub(crate) fn close(&self) {
        self.set_state(RTCDataChannelState::Closed);
        if let Ok(mut inbox) = self.inbox.lock() {
            for waiter in inbox.once.drain(..) {
                let _ = waiter.send(Err(Error::ErrDataChannelClosed));
            }
            inbox.subscribers.clear();
        }
    }
}

/// A data channel owned by a [`PeerConnection`](super::PeerConnection).
///
/// Handles are cheap to clone and all refer to the same channel. Once the
/// connection closes every handle reports `closed`.
#[derive(Clone)]
pub struct DataChannel {
    shared: Arc<ChannelShared>,
    requests: mpsc::UnboundedSender<Request>,
    max_message_size: usize,
}

impl DataChannel {
    pub(crate) fn new(
        shared: Arc<ChannelShared>,
        requests: mpsc::UnboundedSender<Request>,
        max_message_size: usize,
    ) -> Self {
        DataChannel {
            shared,
            requests,
            max_message_size,
        }
    }

    pub fn id(&self) -> RTCDataChannelId {
        self.shared.id
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn protocol(&self) -> &str {
        &self.shared.protocol
    }

    pub fn ready_state(&self) -> RTCDataChannelState {
        self.shared.status.borrow().state
    }

    /// Resolves once the channel is open. Fails with the open error, or with
    /// [`Error::ErrDataChannelClosed`], if the channel closes first.
    pub async fn ready(&self) -> Result<()> {
        let mut status = self.shared.status.subscribe();
        loop {
            {
                let current = status.borrow_and_update();
                match current.state {
                    RTCDataChannelState::Open => return Ok(()),
                    RTCDataChannelState::Closing | RTCDataChannelState::Closed => {
                        return Err(current
                            .error
                            .clone()
                            .unwrap_or(Error::ErrDataChannelClosed));
                    }
                    RTCDataChannelState::Connecting | RTCDataChannelState::Unspecified => {}
                }
            }
            if status.changed().await.is_err() {
                return Err(Error::ErrDataChannelClosed);
            }
        }
    }

    /// Completes once the channel is closed, locally or remotely.
    pub async fn closed(&self) {
        let mut status = self.shared.status.subscribe();
        let _ = status
            .wait_for(|status| status.state == RTCDataChannelState::Closed)
            .await;
    }

    fn send_message(&self, message: RTCDataChannelMessage) -> Result<()> {
        if self.ready_state() != RTCDataChannelState::Open {
            trace!("dropping send on data channel {}: not open", self.id());
            return Ok(());
        }
        if message.data.len() > self.max_message_size {
            return Err(Error::ErrOutboundPacketTooLarge);
        }
        let _ = self.requests.send(Request::Send {
            channel: self.id(),
            message,
        });
        Ok(())
    }

    /// Sends a binary message. Does nothing unless the channel is open.
    pub fn send(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send_message(RTCDataChannelMessage::binary(data))
    }

    /// Sends a text message. Does nothing unless the channel is open.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_message(RTCDataChannelMessage::text(text))
    }

    /// Subscribes to every message received on the channel. Messages that
    /// arrived while the channel had no subscriber are yielded first.
    pub fn messages(&self) -> MessageStream {
        self.shared.subscribe()
    }

    /// Subscribes to the next message only.
    pub fn message_once(&self) -> MessageOnce {
        self.shared.subscribe_once()
    }

    /// Starts closing the channel; [`closed`](Self::closed) completes when done.
    pub fn close(&self) {
        let _ = self.requests.send(Request::CloseDataChannel(self.id()));
    }
}

impl std::fmt::Debug for DataChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataChannel")
            .field("id", &self.shared.id)
            .field("label", &self.shared.label)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}
