//! # Integration Scenarios
//!
//! Every scenario runs real [`fleet_runtime::FleetNode`]s sharing one
//! in-memory transport.

pub mod harness;

mod control;
mod fan_in;
