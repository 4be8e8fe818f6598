//! # Bus Bridge
//!
//! Outbound gateway: one envelope in, one transport publish out. No
//! batching, no retry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use fleet_types::EventEnvelope;

use crate::codec::EventCodec;
use crate::errors::BusError;
use crate::transport::Transport;

/// Hands envelopes to the transport.
#[async_trait]
pub trait BusBridge: Send + Sync {
    /// Encode and publish one envelope.
    ///
    /// Returns the number of subscribers the transport reached.
    async fn send(&self, event: &EventEnvelope) -> Result<usize, BusError>;
}

/// Bridge publishing to a single bus topic.
pub struct StreamBridge {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn EventCodec>,
    destination: String,
}

impl StreamBridge {
    pub fn new(
        transport: Arc<dyn Transport>,
        codec: Arc<dyn EventCodec>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            codec,
            destination: destination.into(),
        }
    }

    /// The bus topic.
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

#[async_trait]
impl BusBridge for StreamBridge {
    async fn send(&self, event: &EventEnvelope) -> Result<usize, BusError> {
        let payload = self.codec.encode(event)?;
        let receivers = self.transport.publish(&self.destination, payload).await?;

        debug!(
            event_id = %event.id(),
            event_type = event.type_name(),
            origin = event.origin_service(),
            destination = event.destination_service(),
            topic = %self.destination,
            receivers,
            "Event sent to bus"
        );
        Ok(receivers)
    }
}
