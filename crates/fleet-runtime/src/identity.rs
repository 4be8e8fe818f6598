//! Local identity resolution.
//!
//! An explicit `FLEET_BUS_ID` wins. Otherwise the identity is
//! `{app}[:{profiles}]:{port}:{random}` where the random part is a fresh
//! 32-hex-char discriminator, so two instances on the same host and port
//! never collide.

use uuid::Uuid;

use fleet_types::ServiceId;

use crate::config::{ConfigError, IdentityConfig};

pub fn resolve_identity(config: &IdentityConfig) -> Result<ServiceId, ConfigError> {
    let resolved = match &config.id {
        Some(id) => ServiceId::new(id.as_str()),
        None => ServiceId::derive(
            &config.app_name,
            &config.profiles,
            config.port,
            &Uuid::new_v4().simple().to_string(),
        ),
    };
    resolved.map_err(|_| ConfigError::BlankIdentity)
}
