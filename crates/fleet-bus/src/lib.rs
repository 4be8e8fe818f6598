//! # Fleet Bus - Control Events Across a Service Fleet
//!
//! Addressing, acknowledgment and trace core of the fleet bus.
//!
//! ## Data Flow
//!
//! ```text
//!  local event ──► OutboundListener ──► BusBridge ──► Transport
//!                  (from self? not ack?)                 │
//!                                                        ▼
//!  local listeners ◄── InMemoryEventBus ◄── BusConsumer (every subscriber)
//!                                            │  for self? from self?
//!                                            ├─► deliver locally
//!                                            ├─► ack via BusBridge
//!                                            └─► sent notice for tracing
//! ```
//!
//! ## Loop Prevention
//!
//! - An event whose origin matches the local identity is never delivered
//!   locally by the consumer
//! - Acks are never acked
//! - Only events raised by this instance are forwarded outward

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bridge;
pub mod codec;
pub mod consumer;
pub mod destination;
pub mod environment;
pub mod errors;
pub mod events;
pub mod matcher;
pub mod outbound;
pub mod publisher;
pub mod subscriber;
pub mod trace;
pub mod transport;

// Re-export main types
pub use bridge::{BusBridge, StreamBridge};
pub use codec::{CodecError, EventCodec, JsonCodec};
pub use consumer::{BusConsumer, BusFeatures, DispatchOutcome, Disposition};
pub use destination::{
    resolve_ack_target, AckTarget, Destination, DestinationFactory, PathDestinationFactory,
    TaggedDestinationFactory,
};
pub use environment::{EnvironmentStore, InMemoryEnvironment};
pub use errors::BusError;
pub use events::{LocalEvent, LocalEventFilter, LocalTopic};
pub use matcher::{PathMatcher, PatternMatcher, ProfileAwareMatcher, ServiceMatcher};
pub use outbound::OutboundListener;
pub use publisher::{InMemoryEventBus, LocalEventPublisher};
pub use subscriber::{EventStream, Subscription, SubscriptionError};
pub use trace::{TraceListener, TraceRepository};
pub use transport::{InMemoryTransport, Transport, TransportError, TransportReceiver};

/// Maximum messages to buffer per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Trace records kept when no capacity is configured.
pub const DEFAULT_TRACE_CAPACITY: usize = 100;

/// Transport topic shared by every instance of the fleet.
pub const DEFAULT_BUS_DESTINATION: &str = "fleetBus";
