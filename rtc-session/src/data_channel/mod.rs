use bytes::Bytes;
use sansio::Protocol;

use crate::error::{Error, Result};
use crate::peer_connection::RTCPeerConnection;

pub(crate) mod init;
pub(crate) mod manager;
pub(crate) mod message;
pub(crate) mod state;

pub use init::RTCDataChannelInit;
pub use message::RTCDataChannelMessage;
pub use state::RTCDataChannelState;

/// Identifier for a data channel within a particular peer connection
pub type RTCDataChannelId = u16;

/// DataChannel represents a WebRTC DataChannel
/// The DataChannel interface represents a network channel
/// which can be used for bidirectional peer-to-peer transfers of arbitrary data
///
/// The handle borrows its peer connection; a channel that has reached
/// `closed` is forgotten by the connection and every accessor reports
/// [`Error::ErrDataChannelClosed`].
///
/// ## Specifications
///
/// * [MDN]
/// * [W3C]
///
/// [MDN]: https://developer.mozilla.org/en-US/docs/Web/API/RTCDataChannel
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannel
pub struct RTCDataChannel<'a> {
    pub(crate) id: RTCDataChannelId,
    pub(crate) peer_connection: &'a mut RTCPeerConnection,
}

impl RTCDataChannel<'_> {
    fn internal(&self) -> Result<&manager::RTCDataChannelInternal> {
        self.peer_connection
            .data_channels
            .get(self.id)
            .ok_or(Error::ErrDataChannelClosed)
    }

    pub fn id(&self) -> RTCDataChannelId {
        self.id
    }

    /// label represents a label that can be used to distinguish this
    /// DataChannel object from other DataChannel objects.
    pub fn label(&self) -> Result<String> {
        Ok(self.internal()?.label.clone())
    }

    pub fn protocol(&self) -> Result<String> {
        Ok(self.internal()?.init.protocol.clone())
    }

    /// Ordered returns true if the DataChannel is ordered, and false if
    /// out-of-order delivery is allowed.
    pub fn ordered(&self) -> Result<bool> {
        Ok(self.internal()?.init.ordered)
    }

    pub fn max_packet_life_time(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.init.max_packet_life_time)
    }

    pub fn max_retransmits(&self) -> Result<Option<u16>> {
        Ok(self.internal()?.init.max_retransmits)
    }

    pub fn negotiated(&self) -> Result<bool> {
        Ok(self.internal()?.init.negotiated)
    }

    /// ready_state represents the state of the DataChannel object.
    pub fn ready_state(&self) -> RTCDataChannelState {
        self.internal()
            .map(|dc| dc.ready_state)
            .unwrap_or(RTCDataChannelState::Closed)
    }

    /// send sends the binary message to the DataChannel peer. Does nothing
    /// unless the channel is open.
    pub fn send(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.peer_connection
            .handle_write((self.id, RTCDataChannelMessage::binary(data)))
    }

    /// send_text sends the text message to the DataChannel peer. Does
    /// nothing unless the channel is open.
    pub fn send_text(&mut self, s: impl Into<String>) -> Result<()> {
        self.peer_connection
            .handle_write((self.id, RTCDataChannelMessage::text(s)))
    }

    pub fn close(&mut self) -> Result<()> {
        self.peer_connection.close_data_channel(self.id)
    }
}
