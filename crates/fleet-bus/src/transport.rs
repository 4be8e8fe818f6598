//! # Transport
//!
//! The external publish/subscribe collaborator, reduced to the two
//! operations the core needs: publish bytes to a topic and receive the bytes
//! published to it.
//!
//! [`InMemoryTransport`] is a broker stand-in for several nodes living in
//! one process. Real deployments plug a broker client in behind [`Transport`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::DEFAULT_CHANNEL_CAPACITY;

/// Errors from the transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport was shut down.
    #[error("Transport closed")]
    Closed,

    /// The broker refused or failed the send.
    #[error("Send to topic '{topic}' failed: {reason}")]
    SendFailed { topic: String, reason: String },
}

/// Publish/subscribe transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish `payload` to `topic`, fire-and-forget.
    ///
    /// Returns the number of subscribers the payload was handed to.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, TransportError>;

    /// Receive everything published to `topic` from now on.
    fn subscribe(&self, topic: &str) -> Result<TransportReceiver, TransportError>;
}

/// Receiving end of a topic subscription.
pub struct TransportReceiver {
    topic: String,
    receiver: broadcast::Receiver<Vec<u8>>,
}

impl TransportReceiver {
    /// Next message, or `None` once the transport is closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(topic = %self.topic, lagged = count, "Transport receiver lagged, messages dropped");
                }
            }
        }
    }

    /// Next message without waiting; `Ok(None)` when nothing is queued.
    pub fn try_recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.receiver.try_recv() {
                Ok(payload) => return Ok(Some(payload)),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(TransportError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(topic = %self.topic, lagged = count, "Transport receiver lagged, messages dropped");
                }
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// In-process broker with one broadcast channel per topic.
pub struct InMemoryTransport {
    topics: RwLock<HashMap<String, broadcast::Sender<Vec<u8>>>>,
    capacity: usize,
    closed: AtomicBool,
    messages_published: AtomicU64,
}

impl InMemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity,
            closed: AtomicBool::new(false),
            messages_published: AtomicU64::new(0),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        if let Some(sender) = self.topics.read().get(topic) {
            return sender.clone();
        }
        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Close every topic. Receivers drain and then see `None`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.topics.write().clear();
        debug!("In-memory transport closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Live subscribers of `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        match self.sender(topic).send(payload) {
            Ok(receivers) => {
                debug!(topic, receivers, "Message published");
                Ok(receivers)
            }
            Err(_) => {
                warn!(topic, "Message dropped (no subscribers)");
                Ok(0)
            }
        }
    }

    fn subscribe(&self, topic: &str) -> Result<TransportReceiver, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        debug!(topic, "New transport subscription");
        Ok(TransportReceiver {
            topic: topic.to_string(),
            receiver: self.sender(topic).subscribe(),
        })
    }
}
