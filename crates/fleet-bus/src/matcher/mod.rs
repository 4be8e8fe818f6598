//! # Matchers
//!
//! - [`path`]: glob matching of addresses, including multi-profile identities
//! - [`service`]: "is this event from me / for me?" for the local instance

pub mod path;
pub mod service;

pub use path::{PathMatcher, PatternMatcher, ProfileAwareMatcher};
pub use service::ServiceMatcher;
