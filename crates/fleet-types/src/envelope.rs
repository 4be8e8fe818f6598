//! # Event Envelope
//!
//! The addressed, identified unit that travels the bus.
//!
//! ## Wire shape
//!
//! The envelope serializes to one flat JSON object. The `type` field is the
//! discriminator of the carried [`RemoteEvent`]:
//!
//! ```json
//! {
//!   "type": "environment_change",
//!   "id": "6f0c...",
//!   "originService": "billing:dev:8080",
//!   "destinationService": "orders:**",
//!   "timestamp": 1700000000000,
//!   "values": { "feature.x": "on" }
//! }
//! ```

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::address::{DestinationPattern, ServiceId};

/// The closed set of event kinds carried by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteEvent {
    /// Ask matching instances to reload their configuration.
    Refresh,

    /// Write the given entries into the environment of matching instances.
    EnvironmentChange { values: BTreeMap<String, String> },

    /// Confirmation that an instance received an earlier event.
    Ack(AckEvent),

    /// Ask matching instances to exit in an orderly way.
    Shutdown,

    /// An event whose discriminator this build does not know.
    ///
    /// Never produced by serde; the codec builds it from the raw message.
    #[serde(skip)]
    Unknown { type_name: String, payload: Vec<u8> },
}

impl RemoteEvent {
    pub const REFRESH: &'static str = "refresh";
    pub const ENVIRONMENT_CHANGE: &'static str = "environment_change";
    pub const ACK: &'static str = "ack";
    pub const SHUTDOWN: &'static str = "shutdown";

    /// Discriminators this build can decode.
    pub const KNOWN_TYPES: [&'static str; 4] = [
        Self::REFRESH,
        Self::ENVIRONMENT_CHANGE,
        Self::ACK,
        Self::SHUTDOWN,
    ];

    /// Registered name of this event kind, as written in the `type` field.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Refresh => Self::REFRESH,
            Self::EnvironmentChange { .. } => Self::ENVIRONMENT_CHANGE,
            Self::Ack(_) => Self::ACK,
            Self::Shutdown => Self::SHUTDOWN,
            Self::Unknown { type_name, .. } => type_name,
        }
    }

    #[must_use]
    pub fn is_known_type(type_name: &str) -> bool {
        Self::KNOWN_TYPES.contains(&type_name)
    }
}

/// Payload of an acknowledgment.
///
/// Several instances may acknowledge the same event; each ack references the
/// original by `ack_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckEvent {
    /// Id of the acknowledged event.
    pub ack_id: Uuid,
    /// Where the ack itself is delivered.
    pub ack_destination_service: String,
    /// Discriminator of the acknowledged event.
    pub event_type: String,
}

/// An addressed event.
///
/// Immutable after construction: the id and timestamp are assigned once and
/// survive serialization round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    id: Uuid,
    origin_service: String,
    #[serde(default, deserialize_with = "null_as_blank")]
    destination_service: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(flatten)]
    event: RemoteEvent,
}

/// A `null` destination addresses everyone, same as a missing one.
fn null_as_blank<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl EventEnvelope {
    /// Create a new envelope with a fresh id.
    #[must_use]
    pub fn new(origin: &ServiceId, destination: DestinationPattern, event: RemoteEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin_service: origin.to_string(),
            destination_service: destination.into(),
            timestamp: Utc::now().timestamp_millis(),
            event,
        }
    }

    /// Rebuild an envelope from fields read off the wire.
    ///
    /// The destination is kept verbatim: a blank destination is meaningful
    /// to the receiver ("for everyone").
    #[must_use]
    pub fn from_parts(
        id: Uuid,
        origin_service: String,
        destination_service: String,
        timestamp: i64,
        event: RemoteEvent,
    ) -> Self {
        Self {
            id,
            origin_service,
            destination_service,
            timestamp,
            event,
        }
    }

    /// Build the acknowledgment of `original` sent by `origin`.
    #[must_use]
    pub fn ack_for(original: &Self, origin: &ServiceId, ack_destination: DestinationPattern) -> Self {
        let ack = AckEvent {
            ack_id: original.id,
            ack_destination_service: ack_destination.to_string(),
            event_type: original.type_name().to_string(),
        };
        Self::new(origin, ack_destination, RemoteEvent::Ack(ack))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn origin_service(&self) -> &str {
        &self.origin_service
    }

    pub fn destination_service(&self) -> &str {
        &self.destination_service
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn event(&self) -> &RemoteEvent {
        &self.event
    }

    pub fn type_name(&self) -> &str {
        self.event.type_name()
    }

    #[must_use]
    pub fn is_ack(&self) -> bool {
        matches!(self.event, RemoteEvent::Ack(_))
    }

    /// The ack payload, if this envelope is an ack.
    #[must_use]
    pub fn as_ack(&self) -> Option<&AckEvent> {
        match &self.event {
            RemoteEvent::Ack(ack) => Some(ack),
            _ => None,
        }
    }
}
