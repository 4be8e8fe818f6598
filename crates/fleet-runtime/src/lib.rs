//! # Fleet Runtime
//!
//! Runs a fleet-bus node.
//!
//! ## Modules
//!
//! - `config` - Bus configuration and validation
//! - `identity` - Local identity resolution
//! - `endpoints` - Refresh / environment-change / shutdown event builders
//! - `listeners` - Local reactions to delivered events
//! - `node` - Node wiring, dispatch loop and shutdown

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod endpoints;
pub mod identity;
pub mod listeners;
pub mod node;

pub use config::{AckConfig, BusConfig, ConfigError, IdentityConfig, TraceConfig};
pub use endpoints::{environment_change_event, refresh_event, shutdown_event, EndpointError};
pub use identity::resolve_identity;
pub use node::{FleetNode, NodeError};
