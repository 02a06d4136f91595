//! Shared backpressure-aware subscriber stream (§9, "Backpressure on event
//! fan-out"): wraps a [`tokio::sync::broadcast::Receiver`] and turns a
//! lagged subscriber into a terminal `Lagged` item rather than silently
//! skipping values, matching "the slowest subscriber is terminated with an
//! explicit `lagged` error on their stream."
//!
//! Shared by the endpoint's connection-state/notification streams and the
//! host's event stream (§4.6, §4.8) so both fan-out points behave
//! identically under slow consumers.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

/// A subscriber fell behind by `skipped` messages and was disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lagged {
    pub skipped: u64,
}

/// A stream of broadcast items that ends (after yielding one `Err(Lagged)`)
/// the moment the subscriber falls behind, instead of silently resuming
/// from the next available item.
pub struct SubscriberStream<T> {
    inner: BroadcastStream<T>,
    terminated: bool,
}

impl<T: Clone + Send + 'static> SubscriberStream<T> {
    pub fn new(rx: broadcast::Receiver<T>) -> Self {
        Self {
            inner: BroadcastStream::new(rx),
            terminated: false,
        }
    }
}

impl<T: Clone + Send + 'static> Stream for SubscriberStream<T> {
    type Item = Result<T, Lagged>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(item))) => Poll::Ready(Some(Ok(item))),
            Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                this.terminated = true;
                Poll::Ready(Some(Err(Lagged { skipped })))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
