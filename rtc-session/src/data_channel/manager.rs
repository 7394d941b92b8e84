use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use super::init::RTCDataChannelInit;
use super::message::RTCDataChannelMessage;
use super::state::RTCDataChannelState;
use super::RTCDataChannelId;
use crate::error::{Error, Result};
use crate::peer_connection::event::RTCDataChannelEvent;

const MAX_LABEL_LEN: usize = 65535;
const MAX_PROTOCOL_LEN: usize = 65535;

#[derive(Debug, Clone)]
pub(crate) struct RTCDataChannelInternal {
    pub(crate) id: RTCDataChannelId,
    pub(crate) label: String,
    pub(crate) init: RTCDataChannelInit,
    pub(crate) ready_state: RTCDataChannelState,
    pub(crate) is_local: bool,
}

/// Owns every data channel of one connection and drives their state from
/// transport notifications.
///
/// Locally opened channels get even ids, channels announced by the remote
/// peer carry the (odd) id chosen by the engine. A channel is dropped from
/// the set once it reaches `closed`, so its label becomes reusable.
pub(crate) struct DataChannelManager {
    channels: HashMap<RTCDataChannelId, RTCDataChannelInternal>,
    next_local_id: RTCDataChannelId,
    max_message_size: usize,
    events: VecDeque<RTCDataChannelEvent>,
    log_id: String,
}

impl DataChannelManager {
    pub(crate) fn new(max_message_size: usize) -> Self {
        DataChannelManager {
            channels: HashMap::new(),
            next_local_id: 0,
            max_message_size,
            events: VecDeque::new(),
            log_id: String::new(),
        }
    }

    pub(crate) fn with_log_id(mut self, log_id: &str) -> Self {
        self.log_id = log_id.to_owned();
        self
    }

    pub(crate) fn get(&self, id: RTCDataChannelId) -> Option<&RTCDataChannelInternal> {
        self.channels.get(&id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.channels.len()
    }

    pub(crate) fn poll_event(&mut self) -> Option<RTCDataChannelEvent> {
        self.events.pop_front()
    }

    /// Registers a locally initiated channel in `connecting` state.
    pub(crate) fn open(&mut self, label: &str, init: &RTCDataChannelInit) -> Result<RTCDataChannelId> {
        if label.len() > MAX_LABEL_LEN {
            return Err(Error::ErrStringSizeLimit);
        }
        if init.protocol.len() > MAX_PROTOCOL_LEN {
            return Err(Error::ErrProtocolTooLarge);
        }
        if init.max_packet_life_time.is_some() && init.max_retransmits.is_some() {
            return Err(Error::ErrRetransmitsOrPacketLifeTime);
        }
        if self
            .channels
            .values()
            .any(|dc| dc.is_local && dc.label == label)
        {
            return Err(Error::ErrDataChannelLabelInUse(label.to_owned()));
        }

        let id = self.allocate_id()?;
        self.channels.insert(
            id,
            RTCDataChannelInternal {
                id,
                label: label.to_owned(),
                init: init.clone(),
                ready_state: RTCDataChannelState::Connecting,
                is_local: true,
            },
        );
        Ok(id)
    }

    fn allocate_id(&mut self) -> Result<RTCDataChannelId> {
        for _ in 0..=(RTCDataChannelId::MAX / 2) {
            let id = self.next_local_id;
            self.next_local_id = self.next_local_id.wrapping_add(2);
            if !self.channels.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(Error::Other("no data channel ids left".to_owned()))
    }

    /// Registers a channel announced by the remote peer. Returns false when
    /// the id is already in use.
    pub(crate) fn accept(
        &mut self,
        id: RTCDataChannelId,
        label: String,
        init: RTCDataChannelInit,
    ) -> bool {
        if self.channels.contains_key(&id) {
            warn!(
                "[{}] incoming data channel {id} ({label}) collides with an existing channel",
                self.log_id
            );
            return false;
        }

        self.channels.insert(
            id,
            RTCDataChannelInternal {
                id,
                label: label.clone(),
                init,
                ready_state: RTCDataChannelState::Connecting,
                is_local: false,
            },
        );
        self.events.push_back(RTCDataChannelEvent::OnIncoming(id, label));
        true
    }

    pub(crate) fn handle_open(&mut self, id: RTCDataChannelId) {
        let Some(dc) = self.channels.get_mut(&id) else {
            debug!("[{}] open for unknown data channel {id}", self.log_id);
            return;
        };
        if !dc.ready_state.can_transition_to(RTCDataChannelState::Open) {
            warn!(
                "[{}] ignoring open for data channel {id} in state {}",
                self.log_id, dc.ready_state
            );
            return;
        }
        dc.ready_state = RTCDataChannelState::Open;
        self.events.push_back(RTCDataChannelEvent::OnOpen(id));
    }

    /// A transport error closes the channel directly.
    pub(crate) fn handle_error(&mut self, id: RTCDataChannelId, err: Error) {
        if !self.channels.contains_key(&id) {
            debug!("[{}] error for unknown data channel {id}: {err}", self.log_id);
            return;
        }
        self.events.push_back(RTCDataChannelEvent::OnError(id, err));
        self.finish(id);
    }

    pub(crate) fn handle_close(&mut self, id: RTCDataChannelId) {
        if !self.channels.contains_key(&id) {
            debug!("[{}] close for unknown data channel {id}", self.log_id);
            return;
        }
        self.finish(id);
    }

    fn finish(&mut self, id: RTCDataChannelId) {
        if let Some(mut dc) = self.channels.remove(&id) {
            dc.ready_state = RTCDataChannelState::Closed;
            self.events.push_back(RTCDataChannelEvent::OnClose(id));
        }
    }

    /// Moves the channel to `closing`. Returns true when the transport has to
    /// be told to close it.
    pub(crate) fn close_channel(&mut self, id: RTCDataChannelId) -> bool {
        let Some(dc) = self.channels.get_mut(&id) else {
            return false;
        };
        if !dc.ready_state.can_transition_to(RTCDataChannelState::Closing) {
            return false;
        }
        dc.ready_state = RTCDataChannelState::Closing;
        self.events.push_back(RTCDataChannelEvent::OnClosing(id));
        true
    }

    /// Returns whether `message` should be handed to the transport. Sends on
    /// a channel that is not open are dropped without an error.
    pub(crate) fn send(
        &self,
        id: RTCDataChannelId,
        message: &RTCDataChannelMessage,
    ) -> Result<bool> {
        match self.channels.get(&id) {
            Some(dc) if dc.ready_state == RTCDataChannelState::Open => {
                if message.data.len() > self.max_message_size {
                    Err(Error::ErrOutboundPacketTooLarge)
                } else {
                    Ok(true)
                }
            }
            _ => {
                debug!("[{}] dropping send on data channel {id}: not open", self.log_id);
                Ok(false)
            }
        }
    }

    /// Returns whether an inbound message may be delivered.
    pub(crate) fn receive(&self, id: RTCDataChannelId) -> bool {
        matches!(
            self.channels.get(&id),
            Some(dc) if dc.ready_state == RTCDataChannelState::Open
        )
    }

    /// Connection teardown: fails pending opens and closes every channel.
    pub(crate) fn close_all(&mut self) {
        let mut ids: Vec<RTCDataChannelId> = self.channels.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(dc) = self.channels.get(&id) {
                if dc.ready_state == RTCDataChannelState::Connecting {
                    self.events
                        .push_back(RTCDataChannelEvent::OnError(id, Error::ErrConnectionClosed));
                }
            }
            self.finish(id);
        }
    }
}
