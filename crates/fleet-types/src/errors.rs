//! # Error Types
//!
//! Errors raised while building addresses.

use thiserror::Error;

/// Errors from identity and destination construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The local identity resolved to an empty string.
    #[error("Service identity must not be empty")]
    EmptyIdentity,

    /// Destination text could not be turned into a usable pattern.
    #[error("Invalid destination '{raw}': {reason}")]
    InvalidDestination { raw: String, reason: String },
}
