//! # Trace Records
//!
//! Local, non-transported observations of bus traffic.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::EventEnvelope;

/// Local notice that the consumer saw an event go by.
///
/// Published on the local event bus only; never sent to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentEvent {
    pub id: Uuid,
    pub origin_service: String,
    pub destination_service: String,
    pub event_type: String,
}

impl SentEvent {
    #[must_use]
    pub fn observed(event: &EventEnvelope) -> Self {
        Self {
            id: event.id(),
            origin_service: event.origin_service().to_string(),
            destination_service: event.destination_service().to_string(),
            event_type: event.type_name().to_string(),
        }
    }
}

/// Kind of traced signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceSignal {
    /// An event passed through the local consumer.
    #[serde(rename = "fleet.bus.sent")]
    Sent,
    /// An acknowledgment from another instance was received.
    #[serde(rename = "fleet.bus.ack")]
    Ack,
}

impl TraceSignal {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "fleet.bus.sent",
            Self::Ack => "fleet.bus.ack",
        }
    }
}

impl fmt::Display for TraceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the trace store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub timestamp: DateTime<Utc>,
    pub signal: TraceSignal,
    /// Event type of the subject event.
    pub event_type: String,
    /// Id of the subject event. For acks this is the acknowledged event.
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
}

impl TraceRecord {
    #[must_use]
    pub fn sent(event: &SentEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            signal: TraceSignal::Sent,
            event_type: event.event_type.clone(),
            id: event.id,
            origin: event.origin_service.clone(),
            destination: event.destination_service.clone(),
        }
    }

    /// Record for an ack envelope; `None` when `ack` is not an ack.
    #[must_use]
    pub fn ack_received(ack: &EventEnvelope) -> Option<Self> {
        let payload = ack.as_ack()?;
        Some(Self {
            timestamp: Utc::now(),
            signal: TraceSignal::Ack,
            event_type: payload.event_type.clone(),
            id: payload.ack_id,
            origin: ack.origin_service().to_string(),
            destination: payload.ack_destination_service.clone(),
        })
    }
}
