//! # Fleet Bus Test Suite
//!
//! Unified test crate for scenarios that need several nodes on one
//! transport.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs      # Fleet setup and wait helpers
//!     ├── fan_in.rs       # Delivery, acks and traces across nodes
//!     └── control.rs      # Environment, shutdown, aliases, unknown events
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fleet-tests
//! cargo test -p fleet-tests integration::fan_in
//! ```

#![allow(dead_code)]

pub mod integration;
