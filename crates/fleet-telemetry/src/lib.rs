//! # Fleet Telemetry
//!
//! Logging and metrics for fleet-bus nodes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleet_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_telemetry(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OTEL_SERVICE_NAME` | `fleet-bus` | Service name attached to every log line |
//! | `FLEET_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `FLEET_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `FLEET_JSON_LOGS` | `false` | JSON log lines |
//! | `FLEET_METRICS_PORT` | `9100` | Port for the host's metrics endpoint |
//!
//! This crate does not serve metrics itself. The host application renders
//! [`gather_metrics`] on `metrics_port` with whatever HTTP stack it runs.

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    gather_metrics, register_metrics, FLEET_BUS_ACKS_SENT, FLEET_BUS_DECODE_FAILURES,
    FLEET_BUS_EVENTS_DELIVERED, FLEET_BUS_MESSAGES_RECEIVED, FLEET_BUS_MESSAGES_SENT,
    FLEET_BUS_TRACE_RECORDS, FLEET_BUS_UNKNOWN_EVENTS, REGISTRY,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics, then install the global log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)?;

    tracing::info!(
        service = %config.service_name,
        metrics_port = config.metrics_port,
        "Telemetry initialized"
    );
    Ok(())
}
