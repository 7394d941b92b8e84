use bytes::Bytes;

/// RTCDataChannelMessage represents a message sent or received on a
/// data channel. `is_string` is set when the payload is UTF-8 text,
/// otherwise the message is binary.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCDataChannelMessage {
    pub is_string: bool,
    pub data: Bytes,
}

impl RTCDataChannelMessage {
    pub fn text(s: impl Into<String>) -> Self {
        RTCDataChannelMessage {
            is_string: true,
            data: Bytes::from(s.into()),
        }
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        RTCDataChannelMessage {
            is_string: false,
            data: data.into(),
        }
    }

    /// Returns the payload as text when it was sent as a string and is
    /// valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        if self.is_string {
            std::str::from_utf8(&self.data).ok()
        } else {
            None
        }
    }
}
