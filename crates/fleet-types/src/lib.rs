//! # Fleet Types
//!
//! Data model for the fleet bus.
//!
//! ## Addressing
//!
//! Every instance has a colon-delimited identity such as
//! `billing:dev,cloud:8080:5f1c...`. Events carry a destination pattern with
//! the same segment grammar plus the wildcards `*` (within one segment) and
//! `**` (any trailing segments):
//!
//! ```text
//! billing            -> billing:**
//! billing:dev        -> billing:dev:**
//! billing:dev:8080   -> billing:dev:8080
//! (none)             -> **
//! ```
//!
//! ## Envelope
//!
//! [`EventEnvelope`] wraps one [`RemoteEvent`] with its id, origin and
//! destination. It is immutable once built and travels the transport as-is.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod address;
pub mod envelope;
pub mod errors;
pub mod trace;

pub use address::{DestinationPattern, ServiceId, MATCH_ALL, SEGMENT_SEPARATOR};
pub use envelope::{AckEvent, EventEnvelope, RemoteEvent};
pub use errors::AddressError;
pub use trace::{SentEvent, TraceRecord, TraceSignal};
