//! # Bus Errors

use thiserror::Error;

use fleet_types::AddressError;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Errors surfaced by the bus core.
///
/// Nothing here is retried by the core: a failed send is reported to the
/// caller and the local delivery that preceded it stands.
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
