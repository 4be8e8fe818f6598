//! # Service Matcher
//!
//! Answers the two routing questions the consumer asks of every envelope.
//!
//! ## Asymmetry
//!
//! - from-self: the envelope's *origin* is the pattern, the local identity
//!   is the candidate
//! - for-self: the envelope's *destination* is the pattern, tested against
//!   the local identity and then against each configured alias
//!
//! Neither check fails: no match is simply `false`.

use std::sync::Arc;

use fleet_types::{EventEnvelope, ServiceId};

use super::path::{PathMatcher, PatternMatcher, ProfileAwareMatcher};

/// Routing decisions for the local instance.
#[derive(Clone)]
pub struct ServiceMatcher {
    matcher: Arc<dyn PatternMatcher>,
    id: ServiceId,
    config_names: Vec<String>,
}

impl ServiceMatcher {
    /// Matcher for `id` using the profile-aware path matcher.
    #[must_use]
    pub fn new(id: ServiceId) -> Self {
        Self::with_matcher(id, Arc::new(ProfileAwareMatcher::<PathMatcher>::default()))
    }

    #[must_use]
    pub fn with_matcher(id: ServiceId, matcher: Arc<dyn PatternMatcher>) -> Self {
        Self {
            matcher,
            id,
            config_names: Vec::new(),
        }
    }

    /// Alternate names this instance also answers to.
    ///
    /// Each alias gets the identity's suffix appended before matching, so
    /// alias `billing-v2` of `billing:dev:8080` is tried as `billing-v2:dev:8080`.
    #[must_use]
    pub fn with_config_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config_names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| !name.trim().is_empty())
            .collect();
        self
    }

    /// The local identity.
    pub fn service_id(&self) -> &ServiceId {
        &self.id
    }

    pub fn config_names(&self) -> &[String] {
        &self.config_names
    }

    /// True if the envelope was raised by this instance.
    #[must_use]
    pub fn is_from_self(&self, event: &EventEnvelope) -> bool {
        self.matcher
            .matches(event.origin_service(), self.id.as_str())
    }

    /// True if the envelope is addressed to this instance.
    #[must_use]
    pub fn is_for_self(&self, event: &EventEnvelope) -> bool {
        let destination = event.destination_service();
        if destination.trim().is_empty() || self.matcher.matches(destination, self.id.as_str()) {
            return true;
        }

        self.config_names.iter().any(|name| {
            let candidate = match self.id.suffix() {
                Some(suffix) => format!("{name}{suffix}"),
                None => name.clone(),
            };
            self.matcher.matches(destination, &candidate)
        })
    }
}

impl std::fmt::Debug for ServiceMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceMatcher")
            .field("id", &self.id)
            .field("config_names", &self.config_names)
            .finish_non_exhaustive()
    }
}
