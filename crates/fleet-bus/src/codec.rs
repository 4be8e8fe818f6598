//! # Event Codec
//!
//! Envelope to wire bytes and back.
//!
//! The discriminator is the `type` field. A message whose discriminator this
//! build does not know still decodes: it becomes [`RemoteEvent::Unknown`]
//! with the raw bytes attached, so observers see its id, origin and
//! destination instead of losing the whole message.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use fleet_types::{EventEnvelope, RemoteEvent};

/// Codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Bytes are not valid JSON or do not fit the declared type.
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// No `type` discriminator.
    #[error("Event payload has no 'type' discriminator")]
    MissingDiscriminator,

    /// A header field every envelope carries is missing or invalid.
    #[error("Event payload has a missing or invalid '{0}' field")]
    InvalidHeader(&'static str),
}

/// Envelope serialization.
pub trait EventCodec: Send + Sync {
    fn encode(&self, event: &EventEnvelope) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<EventEnvelope, CodecError>;
}

/// JSON wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn decode_unknown(
        type_name: String,
        value: &Value,
        bytes: &[u8],
    ) -> Result<EventEnvelope, CodecError> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(CodecError::InvalidHeader("id"))?;
        let origin = value
            .get("originService")
            .and_then(Value::as_str)
            .ok_or(CodecError::InvalidHeader("originService"))?;
        let destination = value
            .get("destinationService")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let timestamp = value
            .get("timestamp")
            .and_then(Value::as_i64)
            .unwrap_or_default();

        Ok(EventEnvelope::from_parts(
            id,
            origin.to_string(),
            destination.to_string(),
            timestamp,
            RemoteEvent::Unknown {
                type_name,
                payload: bytes.to_vec(),
            },
        ))
    }
}

impl EventCodec for JsonCodec {
    fn encode(&self, event: &EventEnvelope) -> Result<Vec<u8>, CodecError> {
        match event.event() {
            // Forward unknown events exactly as received.
            RemoteEvent::Unknown { payload, .. } => Ok(payload.clone()),
            _ => Ok(serde_json::to_vec(event)?),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<EventEnvelope, CodecError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingDiscriminator)?
            .to_string();

        if RemoteEvent::is_known_type(&type_name) {
            Ok(serde_json::from_value(value)?)
        } else {
            Self::decode_unknown(type_name, &value, bytes)
        }
    }
}
