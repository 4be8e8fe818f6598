//! # Administrative Endpoints
//!
//! Build the envelopes an operator asks for. Each function takes the local
//! identity, the destination factory and an optional destination override;
//! no override addresses the whole fleet.

use std::collections::BTreeMap;

use thiserror::Error;

use fleet_bus::DestinationFactory;
use fleet_types::{AddressError, EventEnvelope, RemoteEvent, ServiceId};

/// Rejected operator requests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Invalid destination: {0}")]
    Destination(#[from] AddressError),

    /// An environment change names a blank key.
    #[error("Environment keys must not be blank")]
    BlankEnvironmentKey,
}

/// Ask matching instances to reload their configuration.
pub fn refresh_event(
    origin: &ServiceId,
    factory: &dyn DestinationFactory,
    destination: Option<&str>,
) -> Result<EventEnvelope, EndpointError> {
    build(origin, factory, destination, RemoteEvent::Refresh)
}

/// Ask matching instances to apply `values` to their environment.
///
/// Blank keys are rejected.
pub fn environment_change_event(
    origin: &ServiceId,
    factory: &dyn DestinationFactory,
    values: BTreeMap<String, String>,
    destination: Option<&str>,
) -> Result<EventEnvelope, EndpointError> {
    if values.keys().any(|k| k.trim().is_empty()) {
        return Err(EndpointError::BlankEnvironmentKey);
    }
    build(
        origin,
        factory,
        destination,
        RemoteEvent::EnvironmentChange { values },
    )
}

/// Ask matching instances to stop.
pub fn shutdown_event(
    origin: &ServiceId,
    factory: &dyn DestinationFactory,
    destination: Option<&str>,
) -> Result<EventEnvelope, EndpointError> {
    build(origin, factory, destination, RemoteEvent::Shutdown)
}

fn build(
    origin: &ServiceId,
    factory: &dyn DestinationFactory,
    destination: Option<&str>,
    event: RemoteEvent,
) -> Result<EventEnvelope, EndpointError> {
    let destination = factory.get_destination(destination)?;
    Ok(EventEnvelope::new(origin, destination.into_pattern(), event))
}
