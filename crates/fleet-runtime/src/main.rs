//! # Fleet Node
//!
//! Demo entry point: runs the configured node plus two peers over the
//! in-memory transport, publishes a refresh to the fleet and waits for
//! Ctrl+C or a remote shutdown.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging + metrics)
//! 2. Load bus configuration from the environment
//! 3. Start the node and its peers
//! 4. Publish a refresh and report acknowledgments
//! 5. Run until stopped

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use fleet_bus::InMemoryTransport;
use fleet_runtime::{BusConfig, FleetNode};
use fleet_telemetry::{gather_metrics, init_telemetry, TelemetryConfig};

/// Peer identities started next to the configured node.
const PEERS: [&str; 2] = ["orders:prod:9001", "inventory:prod,cloud:9002"];

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::for_service("fleet-node");
    init_telemetry(&telemetry).context("Failed to initialize telemetry")?;

    let config = BusConfig::from_env().context("Failed to load bus configuration")?;
    let transport = Arc::new(InMemoryTransport::new());

    let node = FleetNode::new(config.clone(), transport.clone()).context("Failed to create node")?;
    node.start().await.context("Failed to start node")?;

    let mut peers = Vec::with_capacity(PEERS.len());
    for id in PEERS {
        let mut peer_config = config.clone();
        peer_config.identity.id = Some(id.to_string());
        peer_config.config_names.clear();
        let peer = FleetNode::new(peer_config, transport.clone())
            .with_context(|| format!("Failed to create peer {id}"))?;
        peer.start().await.with_context(|| format!("Failed to start peer {id}"))?;
        peers.push(peer);
    }

    if config.enabled {
        let event_id = node
            .publish_refresh(None)
            .await
            .context("Failed to publish refresh")?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        info!(%event_id, traces = node.traces().len(), "Refresh broadcast to the fleet");
    }

    info!(service_id = %node.service_id(), "Node is running. Press Ctrl+C to stop.");
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
        }
        _ = node.wait_for_shutdown() => {
            info!("Remote shutdown received");
        }
    }

    for peer in &peers {
        peer.shutdown().await;
    }
    node.shutdown().await;
    transport.close();

    if let Ok(metrics) = gather_metrics() {
        info!("Final metrics:\n{metrics}");
    }
    Ok(())
}
