//! Prometheus metrics for fleet-bus traffic.
//!
//! All metrics follow the naming convention: `fleet_bus_<metric>_total`

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Envelopes handed to the transport, by event type
    pub static ref FLEET_BUS_MESSAGES_SENT: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_messages_sent_total", "Envelopes published to the bus"),
        &["event_type"]
    ).expect("metric creation failed");

    /// Envelopes received from the transport, by event type
    pub static ref FLEET_BUS_MESSAGES_RECEIVED: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_messages_received_total", "Envelopes received from the bus"),
        &["event_type"]
    ).expect("metric creation failed");

    /// Remote events delivered to local listeners
    pub static ref FLEET_BUS_EVENTS_DELIVERED: Counter = Counter::new(
        "fleet_bus_events_delivered_total",
        "Remote events delivered to local listeners"
    ).expect("metric creation failed");

    /// Acks emitted by this instance
    pub static ref FLEET_BUS_ACKS_SENT: Counter = Counter::new(
        "fleet_bus_acks_sent_total",
        "Acknowledgments emitted for received events"
    ).expect("metric creation failed");

    /// Trace records written, by signal
    pub static ref FLEET_BUS_TRACE_RECORDS: CounterVec = CounterVec::new(
        Opts::new("fleet_bus_trace_records_total", "Trace records written"),
        &["signal"]
    ).expect("metric creation failed");

    /// Inbound events with an unrecognised type
    pub static ref FLEET_BUS_UNKNOWN_EVENTS: Counter = Counter::new(
        "fleet_bus_unknown_events_total",
        "Inbound events decoded as unknown"
    ).expect("metric creation failed");

    /// Inbound payloads that could not be decoded at all
    pub static ref FLEET_BUS_DECODE_FAILURES: Counter = Counter::new(
        "fleet_bus_decode_failures_total",
        "Inbound payloads rejected by the codec"
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once: metrics already registered are skipped.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(FLEET_BUS_MESSAGES_SENT.clone()),
        Box::new(FLEET_BUS_MESSAGES_RECEIVED.clone()),
        Box::new(FLEET_BUS_EVENTS_DELIVERED.clone()),
        Box::new(FLEET_BUS_ACKS_SENT.clone()),
        Box::new(FLEET_BUS_TRACE_RECORDS.clone()),
        Box::new(FLEET_BUS_UNKNOWN_EVENTS.clone()),
        Box::new(FLEET_BUS_DECODE_FAILURES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
