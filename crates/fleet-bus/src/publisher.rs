//! # Local Event Publisher
//!
//! Fan-out of delivered envelopes and sent notices to in-process listeners.
//!
//! Every subscriber sees every event; filtering happens on the receiving
//! side. The bus also keeps a count of live subscriptions per topic set so
//! hosts can check that their listeners are attached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::events::{LocalEvent, LocalEventFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Live subscriptions keyed by the topic set they listen to.
pub(crate) type SubscriptionCounts = Arc<RwLock<HashMap<String, usize>>>;

pub(crate) fn subscription_key(filter: &LocalEventFilter) -> String {
    format!("{:?}", filter.topics)
}

/// Sink the consumer delivers into.
#[async_trait]
pub trait LocalEventPublisher: Send + Sync {
    /// Hand `event` to every local subscriber. Returns how many got it.
    async fn publish(&self, event: LocalEvent) -> usize;

    /// Events handed to [`publish`](Self::publish) so far, delivered or not.
    fn events_published(&self) -> u64;
}

/// Broadcast-channel local bus.
///
/// A slow subscriber that falls more than `capacity` events behind loses
/// the oldest ones and is told how many it missed.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<LocalEvent>,
    live: SubscriptionCounts,
    published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
            live: SubscriptionCounts::default(),
            published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Attach a listener. Events outside `filter` are skipped on receive.
    #[must_use]
    pub fn subscribe(&self, filter: LocalEventFilter) -> Subscription {
        let key = subscription_key(&filter);
        *self.live.write().entry(key.clone()).or_default() += 1;
        debug!(topics = %key, "Local listener attached");

        Subscription::new(self.sender.subscribe(), filter, self.live.clone(), key)
    }

    /// Like [`subscribe`](Self::subscribe), as a `Stream`.
    #[must_use]
    pub fn event_stream(&self, filter: LocalEventFilter) -> EventStream {
        EventStream::new(self.subscribe(filter))
    }

    /// Receivers currently attached, whatever their filter.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Live subscriptions whose topic set equals `filter`'s.
    #[must_use]
    pub fn subscriptions_for(&self, filter: &LocalEventFilter) -> usize {
        self.live
            .read()
            .get(&subscription_key(filter))
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalEventPublisher for InMemoryEventBus {
    async fn publish(&self, event: LocalEvent) -> usize {
        let topic = event.topic();
        self.published.fetch_add(1, Ordering::Relaxed);

        let Ok(receivers) = self.sender.send(event) else {
            warn!(?topic, "No local listeners, event dropped");
            return 0;
        };
        debug!(?topic, receivers, "Local event published");
        receivers
    }

    fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}
