use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use super::data_channel::DataChannel;
use crate::data_channel::RTCDataChannelMessage;
use crate::error::{Error, Result};
use crate::media_stream::MediaStream;
use crate::peer_connection::transport::RTCIceCandidateInit;

/// Local candidates of the current gathering pass, in discovery order.
///
/// Candidates discovered before the subscription are replayed first. The
/// stream ends right after the pass's end-of-candidates, or when the
/// connection closes.
pub struct CandidateStream {
    pub(crate) rx: mpsc::UnboundedReceiver<RTCIceCandidateInit>,
}

impl Stream for CandidateStream {
    type Item = RTCIceCandidateInit;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Channels opened by the remote peer, one element each. Ends when the
/// connection closes.
pub struct IncomingDataChannels {
    pub(crate) rx: mpsc::UnboundedReceiver<DataChannel>,
}

impl Stream for IncomingDataChannels {
    type Item = DataChannel;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Media streams attached by the remote peer, in arrival order. Ends when
/// the connection closes.
pub struct RemoteStreams {
    pub(crate) rx: mpsc::UnboundedReceiver<MediaStream>,
}

impl Stream for RemoteStreams {
    type Item = MediaStream;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Every message received on a channel. Messages that arrived before the
/// channel had any subscriber come first. Ends when the channel closes.
pub struct MessageStream {
    pub(crate) rx: mpsc::UnboundedReceiver<RTCDataChannelMessage>,
}

impl Stream for MessageStream {
    type Item = RTCDataChannelMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Resolves with the next message not yet handed to a subscriber, or with [`Error::ErrDataChannelClosed`] if the channel closes first.
pub struct MessageOnce {
    pub(crate) rx: oneshot::Receiver<Result<RTCDataChannelMessage>>,
}

impl Future for MessageOnce {
    type Output = Result<RTCDataChannelMessage>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| Error::ErrDataChannelClosed).and_then(|r| r))
    }
}
