//! Logging and metrics settings, read from the process environment.

use std::env;

const DEFAULT_SERVICE_NAME: &str = "fleet-bus";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_METRICS_PORT: u16 = 9100;

/// Settings for [`init_telemetry`](crate::init_telemetry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Attached to every log line as `service`.
    pub service_name: String,

    /// A level (`debug`, `info`, ...) or a full `EnvFilter` directive.
    pub log_level: String,

    pub console_output: bool,
    pub json_logs: bool,

    /// Where the host application serves [`gather_metrics`](crate::gather_metrics).
    /// Nothing in this crate binds it.
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: DEFAULT_METRICS_PORT,
        }
    }
}

impl TelemetryConfig {
    /// Read `OTEL_SERVICE_NAME`, `FLEET_LOG_LEVEL` (falling back to
    /// `RUST_LOG`), `FLEET_CONSOLE_OUTPUT`, `FLEET_JSON_LOGS` and
    /// `FLEET_METRICS_PORT`. Unset or unparsable values keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key).map_or(default, |v| parse_flag(&v, default))
        };

        Self {
            service_name: lookup("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("FLEET_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            console_output: flag("FLEET_CONSOLE_OUTPUT", defaults.console_output),
            json_logs: flag("FLEET_JSON_LOGS", defaults.json_logs),
            metrics_port: lookup("FLEET_METRICS_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.metrics_port),
        }
    }

    /// Environment settings with the service name fixed.
    pub fn for_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            ..Self::from_env()
        }
    }
}

/// `true`/`1`/`yes` and `false`/`0`/`no`, anything else gives `default`.
pub(crate) fn parse_flag(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(TelemetryConfig::from_lookup(lookup(&[])), TelemetryConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("OTEL_SERVICE_NAME", "orders"),
            ("RUST_LOG", "fleet_bus=debug"),
            ("FLEET_JSON_LOGS", "yes"),
            ("FLEET_METRICS_PORT", "9200"),
        ]));
        assert_eq!(config.service_name, "orders");
        assert_eq!(config.log_level, "fleet_bus=debug");
        assert!(config.json_logs);
        assert!(config.console_output);
        assert_eq!(config.metrics_port, 9200);
    }

    #[test]
    fn test_fleet_level_wins_over_rust_log() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("FLEET_LOG_LEVEL", "warn"),
            ("RUST_LOG", "trace"),
            ("FLEET_METRICS_PORT", "not-a-port"),
        ]));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.metrics_port, DEFAULT_METRICS_PORT);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE", false));
        assert!(parse_flag(" 1 ", false));
        assert!(!parse_flag("no", true));
        assert!(parse_flag("maybe", true));
        assert!(!parse_flag("maybe", false));
    }
}
