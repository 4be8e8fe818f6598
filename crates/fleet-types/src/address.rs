//! # Addresses
//!
//! Service identities and destination patterns.
//!
//! Both share one grammar: segments separated by [`SEGMENT_SEPARATOR`].
//! The second segment may be a comma-separated profile list; no other
//! segment may contain commas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AddressError;

/// Separator between address segments.
pub const SEGMENT_SEPARATOR: char = ':';

/// Pattern that matches every identity.
pub const MATCH_ALL: &str = "**";

/// Separator between profiles inside the profile segment.
pub const PROFILE_SEPARATOR: char = ',';

/// Identity of the local instance, e.g. `billing:dev,cloud:8080`.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceId(String);

impl ServiceId {
    /// Create an identity, rejecting blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, AddressError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(AddressError::EmptyIdentity);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Build the default identity `{name}[:{profiles}]:{port}:{discriminator}`.
    ///
    /// The profile segment is omitted when no profile is active.
    pub fn derive(
        app_name: &str,
        profiles: &[String],
        port: u16,
        discriminator: &str,
    ) -> Result<Self, AddressError> {
        let name = if app_name.trim().is_empty() {
            "application"
        } else {
            app_name.trim()
        };
        let active: Vec<&str> = profiles
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();

        let id = if active.is_empty() {
            format!("{name}:{port}:{discriminator}")
        } else {
            format!("{name}:{}:{port}:{discriminator}", active.join(","))
        };
        Self::new(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything from the first separator on, e.g. `:dev:8080` for
    /// `billing:dev:8080`. `None` when the identity has a single segment.
    #[must_use]
    pub fn suffix(&self) -> Option<&str> {
        self.0.find(SEGMENT_SEPARATOR).map(|idx| &self.0[idx..])
    }

    /// The first segment.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.0
            .split(SEGMENT_SEPARATOR)
            .next()
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ServiceId {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServiceId> for String {
    fn from(value: ServiceId) -> Self {
        value.0
    }
}

/// A normalized destination pattern.
///
/// ## Normalization
///
/// - absent or blank input becomes [`MATCH_ALL`]
/// - a pattern with at most one separator that does not already end in
///   `**` gets `:**` appended, so a bare service name addresses every
///   profile and instance of that service
///
/// Normalization is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DestinationPattern(String);

impl DestinationPattern {
    /// Normalize raw destination text.
    #[must_use]
    pub fn normalize(raw: Option<&str>) -> Self {
        let path = raw
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(MATCH_ALL);

        let suffix = format!("{SEGMENT_SEPARATOR}{MATCH_ALL}");
        if path != MATCH_ALL
            && !path.ends_with(suffix.as_str())
            && path.matches(SEGMENT_SEPARATOR).count() <= 1
        {
            Self(format!("{path}{SEGMENT_SEPARATOR}{MATCH_ALL}"))
        } else {
            Self(path.to_string())
        }
    }

    /// The pattern that addresses every instance.
    #[must_use]
    pub fn all() -> Self {
        Self(MATCH_ALL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.0 == MATCH_ALL
    }
}

impl Default for DestinationPattern {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for DestinationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DestinationPattern {
    fn from(value: String) -> Self {
        Self::normalize(Some(value.as_str()))
    }
}

impl From<&str> for DestinationPattern {
    fn from(value: &str) -> Self {
        Self::normalize(Some(value))
    }
}

impl From<DestinationPattern> for String {
    fn from(value: DestinationPattern) -> Self {
        value.0
    }
}
