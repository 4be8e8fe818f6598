//! # Fleet Harness
//!
//! Builds a fleet of nodes on one in-memory transport and waits for
//! asynchronous dispatch to settle.

use std::sync::Arc;
use std::time::Duration;

use fleet_bus::InMemoryTransport;
use fleet_runtime::{BusConfig, FleetNode};

/// Upper bound for any wait in a scenario.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

/// Adjusts a node's configuration before it starts.
pub type Tweak = fn(&mut BusConfig);

/// A set of started nodes sharing one transport.
pub struct Fleet {
    pub transport: Arc<InMemoryTransport>,
    pub nodes: Vec<FleetNode>,
}

impl Fleet {
    /// Start one node per `(identity, tweak)`.
    pub async fn start(members: &[(&str, Tweak)]) -> Self {
        let transport = Arc::new(InMemoryTransport::new());
        let mut nodes = Vec::with_capacity(members.len());
        for (id, tweak) in members {
            let mut config = BusConfig::default();
            config.identity.id = Some(id.to_string());
            tweak(&mut config);
            let node = FleetNode::new(config, transport.clone()).expect("node config");
            node.start().await.expect("node start");
            nodes.push(node);
        }
        Self { transport, nodes }
    }

    /// Start nodes with default configuration.
    pub async fn with_defaults(ids: &[&str]) -> Self {
        let members: Vec<(&str, Tweak)> = ids.iter().map(|id| (*id, default_config as Tweak)).collect();
        Self::start(&members).await
    }

    pub fn node(&self, id: &str) -> &FleetNode {
        self.nodes
            .iter()
            .find(|n| n.service_id().as_str() == id)
            .expect("unknown node")
    }

    /// Wait until every node has dispatched at least `count` messages.
    pub async fn wait_dispatched(&self, count: u64) {
        wait_until(|| self.nodes.iter().all(|n| n.messages_dispatched() >= count)).await;
    }

    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.shutdown().await;
        }
    }
}

pub fn default_config(_: &mut BusConfig) {}

pub fn with_trace(config: &mut BusConfig) {
    config.trace.enabled = true;
}

/// Poll `check` until it holds, panicking after [`SETTLE_TIMEOUT`].
pub async fn wait_until<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
