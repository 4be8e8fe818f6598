//! # Bus Configuration
//!
//! Defaults for every setting, overridable from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `FLEET_BUS_ENABLED` | `true` |
//! | `FLEET_BUS_ID` | derived, see [`crate::identity`] |
//! | `FLEET_APP_NAME` | `application` |
//! | `FLEET_SERVER_PORT` | `0` |
//! | `FLEET_PROFILES` | none (comma list) |
//! | `FLEET_BUS_DESTINATION` | `fleetBus` |
//! | `FLEET_BUS_CONFIG_NAMES` | none (comma list) |
//! | `FLEET_BUS_ACK_ENABLED` | `true` |
//! | `FLEET_BUS_ACK_DESTINATION` | origin of the acked event |
//! | `FLEET_BUS_TRACE_ENABLED` | `false` |
//! | `FLEET_BUS_TRACE_CAPACITY` | `100` |
//! | `FLEET_BUS_TRACE_REVERSE` | `true` |

use std::env;
use std::str::FromStr;

use thiserror::Error;

use fleet_bus::{
    resolve_ack_target, AckTarget, BusFeatures, DestinationFactory, DEFAULT_BUS_DESTINATION,
    DEFAULT_TRACE_CAPACITY,
};
use fleet_types::AddressError;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No bus topic configured.
    #[error("Bus destination (topic) must not be empty")]
    EmptyDestination,

    /// Ack destination configured but blank.
    #[error("Ack destination must not be blank when set")]
    BlankAckDestination,

    /// Ack destination could not be parsed.
    #[error("Invalid ack destination: {0}")]
    InvalidAckDestination(#[source] AddressError),

    /// Tracing on with nowhere to keep records.
    #[error("Trace capacity must be greater than zero when tracing is enabled")]
    ZeroTraceCapacity,

    /// Explicit identity is blank.
    #[error("Service identity must not be blank")]
    BlankIdentity,

    /// An environment variable holds an unparsable value.
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Where the local identity comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Explicit identity; derived from the other fields when unset.
    pub id: Option<String>,
    pub app_name: String,
    pub port: u16,
    /// Active profiles.
    pub profiles: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            id: None,
            app_name: "application".to_string(),
            port: 0,
            profiles: Vec::new(),
        }
    }
}

/// Acknowledgment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckConfig {
    pub enabled: bool,
    /// Where acks go. Unset means back to the origin of the acked event.
    pub destination: Option<String>,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            destination: None,
        }
    }
}

/// Trace settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    pub enabled: bool,
    pub capacity: usize,
    /// Newest record first.
    pub reverse: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: DEFAULT_TRACE_CAPACITY,
            reverse: true,
        }
    }
}

/// Complete bus configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub enabled: bool,
    /// Transport topic shared by the fleet.
    pub destination: String,
    pub identity: IdentityConfig,
    /// Alternate names this instance answers to.
    pub config_names: Vec<String>,
    pub ack: AckConfig,
    pub trace: TraceConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            destination: DEFAULT_BUS_DESTINATION.to_string(),
            identity: IdentityConfig::default(),
            config_names: Vec::new(),
            ack: AckConfig::default(),
            trace: TraceConfig::default(),
        }
    }
}

impl BusConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var(&lookup, "FLEET_BUS_ENABLED", parse_bool)? {
            config.enabled = v;
        }
        if let Some(v) = lookup("FLEET_BUS_DESTINATION") {
            config.destination = v.trim().to_string();
        }
        if let Some(v) = lookup("FLEET_BUS_CONFIG_NAMES") {
            config.config_names = split_list(&v);
        }

        config.identity.id = lookup("FLEET_BUS_ID");
        if let Some(v) = lookup("FLEET_APP_NAME") {
            config.identity.app_name = v;
        }
        if let Some(v) = parse_var(&lookup, "FLEET_SERVER_PORT", parse_number)? {
            config.identity.port = v;
        }
        if let Some(v) = lookup("FLEET_PROFILES") {
            config.identity.profiles = split_list(&v);
        }

        if let Some(v) = parse_var(&lookup, "FLEET_BUS_ACK_ENABLED", parse_bool)? {
            config.ack.enabled = v;
        }
        config.ack.destination = lookup("FLEET_BUS_ACK_DESTINATION");

        if let Some(v) = parse_var(&lookup, "FLEET_BUS_TRACE_ENABLED", parse_bool)? {
            config.trace.enabled = v;
        }
        if let Some(v) = parse_var(&lookup, "FLEET_BUS_TRACE_CAPACITY", parse_number)? {
            config.trace.capacity = v;
        }
        if let Some(v) = parse_var(&lookup, "FLEET_BUS_TRACE_REVERSE", parse_bool)? {
            config.trace.reverse = v;
        }

        Ok(config)
    }

    /// Check the configuration before a node is built from it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.trim().is_empty() {
            return Err(ConfigError::EmptyDestination);
        }
        if matches!(&self.identity.id, Some(id) if id.trim().is_empty()) {
            return Err(ConfigError::BlankIdentity);
        }
        if matches!(&self.ack.destination, Some(d) if d.trim().is_empty()) {
            return Err(ConfigError::BlankAckDestination);
        }
        if self.trace.enabled && self.trace.capacity == 0 {
            return Err(ConfigError::ZeroTraceCapacity);
        }
        Ok(())
    }

    #[must_use]
    pub fn features(&self) -> BusFeatures {
        BusFeatures {
            ack_enabled: self.ack.enabled,
            trace_enabled: self.trace.enabled,
        }
    }

    /// Resolve the ack destination through `factory`.
    pub fn ack_target(&self, factory: &dyn DestinationFactory) -> Result<AckTarget, ConfigError> {
        resolve_ack_target(factory, self.ack.destination.as_deref()).map_err(|e| {
            if matches!(&self.ack.destination, Some(d) if d.trim().is_empty()) {
                ConfigError::BlankAckDestination
            } else {
                ConfigError::InvalidAckDestination(e)
            }
        })
    }
}

fn parse_var<F, T>(
    lookup: &F,
    key: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => parse(&value).map(Some).ok_or(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_number<T: FromStr>(value: &str) -> Option<T> {
    value.trim().parse().ok()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
