use crate::data_channel::RTCDataChannelId;
use crate::error::Error;

#[allow(clippy::enum_variant_names)]
#[derive(Debug, Clone, PartialEq)]
pub enum RTCDataChannelEvent {
    /// The remote peer opened a channel with the given label.
    OnIncoming(RTCDataChannelId, String),
    OnOpen(RTCDataChannelId),
    OnError(RTCDataChannelId, Error),
    OnClosing(RTCDataChannelId),
    OnClose(RTCDataChannelId),
}

impl RTCDataChannelEvent {
    pub fn channel_id(&self) -> RTCDataChannelId {
        match self {
            RTCDataChannelEvent::OnIncoming(id, _)
            | RTCDataChannelEvent::OnOpen(id)
            | RTCDataChannelEvent::OnError(id, _)
            | RTCDataChannelEvent::OnClosing(id)
            | RTCDataChannelEvent::OnClose(id) => *id,
        }
    }
}
