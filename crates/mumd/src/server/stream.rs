//! Body stream for `GET /update`.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

use mum_core::ChannelId;

use crate::engine::SubscriberId;
use crate::relay::RelayHandle;

/// NDJSON lines for one push subscriber.
///
/// Ends when the relay drops the subscriber. Dropping the stream (the
/// client went away or the response was discarded) unsubscribes it.
pub struct UpdateStream {
    relay: RelayHandle,
    channel: ChannelId,
    subscriber_id: SubscriberId,
    lines: UnboundedReceiverStream<String>,
}

impl UpdateStream {
    pub fn new(
        relay: RelayHandle,
        channel: ChannelId,
        subscriber_id: SubscriberId,
        lines: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            relay,
            channel,
            subscriber_id,
            lines: UnboundedReceiverStream::new(lines),
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Stream for UpdateStream {
    type Item = Result<String, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.lines)
            .poll_next(cx)
            .map(|line| line.map(Ok))
    }
}

impl Drop for UpdateStream {
    fn drop(&mut self) {
        debug!(
            channel = %self.channel,
            subscriber_id = self.subscriber_id,
            "Update stream closed"
        );
        self.relay.unsubscribe_now(self.channel, self.subscriber_id);
    }
}
