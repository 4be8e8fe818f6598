//! # Local Event Subscriber
//!
//! Defines the subscription side of the local event bus.

use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

use crate::events::{LocalEvent, LocalEventFilter};
use crate::publisher::SubscriptionCounts;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was dropped.
    #[error("Local event bus closed")]
    Closed,
}

/// Decrements the bus's subscription bookkeeping when dropped.
struct SubscriptionGuard {
    live: SubscriptionCounts,
    key: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let mut live = self.live.write();
        if let Some(count) = live.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                live.remove(&self.key);
            }
        }
        debug!(topics = %self.key, "Local listener detached");
    }
}

/// Receiving end of a local listener. Dropping it detaches the listener.
pub struct Subscription {
    receiver: broadcast::Receiver<LocalEvent>,
    filter: LocalEventFilter,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<LocalEvent>,
        filter: LocalEventFilter,
        live: SubscriptionCounts,
        key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            guard: SubscriptionGuard { live, key },
        }
    }

    /// Next event passing the filter, or `None` once the bus is gone.
    ///
    /// Events lost to lag are skipped with a debug log.
    pub async fn recv(&mut self) -> Option<LocalEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Local listener fell behind, events skipped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Non-blocking [`recv`](Self::recv): `Ok(None)` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Result<Option<LocalEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    #[must_use]
    pub fn filter(&self) -> &LocalEventFilter {
        &self.filter
    }
}

/// A [`Subscription`] as a `Stream`, for `StreamExt` combinators.
pub struct EventStream {
    inner: BroadcastStream<LocalEvent>,
    filter: LocalEventFilter,
    _guard: SubscriptionGuard,
}

impl EventStream {
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let Subscription {
            receiver,
            filter,
            guard,
        } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            _guard: guard,
        }
    }

    #[must_use]
    pub fn filter(&self) -> &LocalEventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = LocalEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Event stream lagged, some events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
