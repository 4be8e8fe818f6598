//! # Destination Factories
//!
//! Turn raw destination text (from an endpoint parameter or configuration)
//! into a [`Destination`].
//!
//! - [`PathDestinationFactory`]: the text is the pattern itself
//! - [`TaggedDestinationFactory`]: the text is a list of `key=value` (or
//!   `key:value`) tags for routing-capable transports; the pattern is derived
//!   from the `service`, `profile` and `instance` tags
//!
//! Both apply the same `**` suffix normalization as
//! [`DestinationPattern::normalize`].

use std::collections::BTreeMap;

use fleet_types::{AddressError, DestinationPattern, SEGMENT_SEPARATOR};

/// Tag naming the service segment.
pub const SERVICE_TAG: &str = "service";
/// Tag naming the profile segment.
pub const PROFILE_TAG: &str = "profile";
/// Tag naming the instance segment.
pub const INSTANCE_TAG: &str = "instance";

/// A resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Plain pattern.
    Path(DestinationPattern),
    /// Pattern plus routing metadata.
    Tagged {
        pattern: DestinationPattern,
        tags: BTreeMap<String, String>,
    },
}

impl Destination {
    pub fn pattern(&self) -> &DestinationPattern {
        match self {
            Self::Path(pattern) | Self::Tagged { pattern, .. } => pattern,
        }
    }

    /// Routing tags; empty for path destinations.
    #[must_use]
    pub fn tags(&self) -> BTreeMap<String, String> {
        match self {
            Self::Path(_) => BTreeMap::new(),
            Self::Tagged { tags, .. } => tags.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        self.pattern().as_str()
    }

    #[must_use]
    pub fn into_pattern(self) -> DestinationPattern {
        match self {
            Self::Path(pattern) | Self::Tagged { pattern, .. } => pattern,
        }
    }
}

/// Builds destinations from raw text.
pub trait DestinationFactory: Send + Sync {
    /// Resolve `raw`; `None` addresses every instance.
    fn get_destination(&self, raw: Option<&str>) -> Result<Destination, AddressError>;
}

/// Raw text is the pattern.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathDestinationFactory;

impl DestinationFactory for PathDestinationFactory {
    fn get_destination(&self, raw: Option<&str>) -> Result<Destination, AddressError> {
        Ok(Destination::Path(DestinationPattern::normalize(raw)))
    }
}

/// Raw text is a delimiter-separated list of tags.
#[derive(Debug, Clone, Copy)]
pub struct TaggedDestinationFactory {
    delimiter: char,
}

impl TaggedDestinationFactory {
    pub const DEFAULT_DELIMITER: char = ';';

    #[must_use]
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    fn parse_tags(&self, raw: &str) -> Result<BTreeMap<String, String>, AddressError> {
        let mut tags = BTreeMap::new();
        for token in raw.split(self.delimiter).map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = token
                .split_once('=')
                .or_else(|| token.split_once(SEGMENT_SEPARATOR))
                .ok_or_else(|| AddressError::InvalidDestination {
                    raw: raw.to_string(),
                    reason: format!("tag '{token}' is not a key=value pair"),
                })?;

            let (key, value) = (key.trim().to_lowercase(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(AddressError::InvalidDestination {
                    raw: raw.to_string(),
                    reason: format!("tag '{token}' has an empty key or value"),
                });
            }
            tags.insert(key, value.to_string());
        }
        Ok(tags)
    }

    /// `service[:profile][:instance]`, with `*` for a skipped profile.
    fn derive_pattern(tags: &BTreeMap<String, String>) -> DestinationPattern {
        let Some(service) = tags.get(SERVICE_TAG) else {
            return DestinationPattern::all();
        };

        let mut segments = vec![service.as_str()];
        match (tags.get(PROFILE_TAG), tags.get(INSTANCE_TAG)) {
            (Some(profile), Some(instance)) => segments.extend([profile.as_str(), instance.as_str()]),
            (None, Some(instance)) => segments.extend(["*", instance.as_str()]),
            (Some(profile), None) => segments.push(profile.as_str()),
            (None, None) => {}
        }
        DestinationPattern::normalize(Some(segments.join(":").as_str()))
    }
}

impl Default for TaggedDestinationFactory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELIMITER)
    }
}

impl DestinationFactory for TaggedDestinationFactory {
    fn get_destination(&self, raw: Option<&str>) -> Result<Destination, AddressError> {
        let tags = match raw {
            Some(raw) => self.parse_tags(raw)?,
            None => BTreeMap::new(),
        };
        let pattern = Self::derive_pattern(&tags);
        Ok(Destination::Tagged { pattern, tags })
    }
}

/// Where acknowledgments are addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckTarget {
    /// Back to the origin of the acknowledged event.
    Origin,
    /// A fixed, configured destination.
    Fixed(DestinationPattern),
}

impl AckTarget {
    /// Resolve the ack destination for an event raised by `origin`.
    #[must_use]
    pub fn resolve(&self, origin: &str) -> DestinationPattern {
        match self {
            Self::Origin => DestinationPattern::normalize(Some(origin)),
            Self::Fixed(pattern) => pattern.clone(),
        }
    }
}

/// Resolve the configured ack destination.
///
/// Unset means "back to the origin". A configured value must not resolve to
/// an empty destination: blank text, or tags that yield nothing, is a
/// configuration error.
pub fn resolve_ack_target(
    factory: &dyn DestinationFactory,
    configured: Option<&str>,
) -> Result<AckTarget, AddressError> {
    let Some(raw) = configured else {
        return Ok(AckTarget::Origin);
    };

    let empty = || AddressError::InvalidDestination {
        raw: raw.to_string(),
        reason: "ack destination must not be empty".to_string(),
    };

    if raw.trim().is_empty() {
        return Err(empty());
    }

    let destination = factory.get_destination(Some(raw))?;
    if let Destination::Tagged { tags, .. } = &destination {
        if tags.is_empty() {
            return Err(empty());
        }
    }
    if destination.as_str().is_empty() {
        return Err(empty());
    }
    Ok(AckTarget::Fixed(destination.into_pattern()))
}
