//! # Outbound Listener
//!
//! Forwards locally raised events to the bus. Only events this instance
//! raised leave the process, and acks never go through here: the consumer
//! sends those itself.

use std::sync::Arc;

use tracing::debug;

use fleet_types::EventEnvelope;

use crate::bridge::BusBridge;
use crate::errors::BusError;
use crate::matcher::ServiceMatcher;

pub struct OutboundListener {
    matcher: ServiceMatcher,
    bridge: Arc<dyn BusBridge>,
}

impl OutboundListener {
    pub fn new(matcher: ServiceMatcher, bridge: Arc<dyn BusBridge>) -> Self {
        Self { matcher, bridge }
    }

    /// Forward `event` if it qualifies. Returns whether it was sent.
    pub async fn on_local_event(&self, event: &EventEnvelope) -> Result<bool, BusError> {
        if event.is_ack() || !self.matcher.is_from_self(event) {
            debug!(
                event_id = %event.id(),
                origin = event.origin_service(),
                event_type = event.type_name(),
                "Local event not forwarded"
            );
            return Ok(false);
        }

        self.bridge.send(event).await?;
        Ok(true)
    }
}
