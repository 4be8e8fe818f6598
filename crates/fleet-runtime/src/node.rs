//! # Fleet Node
//!
//! One bus participant: the consumer fed from the transport, the local event
//! bus and its listeners, and the outbound path for events this node raises.
//!
//! ## Startup
//!
//! 1. Subscribe to the bus topic
//! 2. Spawn the dispatch loop (one task per inbound message)
//! 3. Spawn the local listeners (refresh, environment, shutdown, trace)
//!
//! ## Shutdown
//!
//! [`FleetNode::shutdown`] or a shutdown event addressed to this node flips a
//! `watch` flag every task selects on.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use fleet_bus::{
    BusConsumer, BusError, DestinationFactory, EnvironmentStore, EventCodec, InMemoryEnvironment,
    InMemoryEventBus, JsonCodec, LocalEvent, LocalEventPublisher, OutboundListener,
    PathDestinationFactory, ServiceMatcher, StreamBridge, TraceListener, TraceRepository,
    Transport, TransportError, TransportReceiver,
};
use fleet_telemetry::{
    FLEET_BUS_ACKS_SENT, FLEET_BUS_DECODE_FAILURES, FLEET_BUS_EVENTS_DELIVERED,
    FLEET_BUS_MESSAGES_RECEIVED, FLEET_BUS_MESSAGES_SENT, FLEET_BUS_UNKNOWN_EVENTS,
};
use fleet_types::{EventEnvelope, RemoteEvent, ServiceId, TraceRecord};

use crate::config::{BusConfig, ConfigError};
use crate::endpoints::{self, EndpointError};
use crate::identity::resolve_identity;
use crate::listeners::{
    environment_filter, refresh_filter, shutdown_filter, trace_filter, EnvironmentListener,
    RefreshListener, ShutdownListener, TraceRecorder,
};

/// How long [`FleetNode::shutdown`] waits for tasks to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Node errors.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `start` called twice.
    #[error("Node already started")]
    AlreadyStarted,

    /// The node was shut down.
    #[error("Node is stopped")]
    Stopped,

    /// The bus is disabled in configuration.
    #[error("Fleet bus is disabled")]
    Disabled,
}

/// A running bus participant.
pub struct FleetNode {
    config: BusConfig,
    matcher: ServiceMatcher,
    local_bus: Arc<InMemoryEventBus>,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn EventCodec>,
    consumer: Arc<BusConsumer>,
    outbound: OutboundListener,
    destination_factory: Arc<dyn DestinationFactory>,
    traces: Arc<TraceRepository>,
    environment: Arc<dyn EnvironmentStore>,
    refreshes: Arc<AtomicU64>,
    dispatched: Arc<AtomicU64>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl FleetNode {
    /// Node with path destinations and an in-memory environment.
    pub fn new(config: BusConfig, transport: Arc<dyn Transport>) -> Result<Self, NodeError> {
        Self::with_parts(
            config,
            transport,
            Arc::new(PathDestinationFactory),
            Arc::new(InMemoryEnvironment::new()),
        )
    }

    /// Node with a custom destination factory and environment store.
    pub fn with_parts(
        config: BusConfig,
        transport: Arc<dyn Transport>,
        destination_factory: Arc<dyn DestinationFactory>,
        environment: Arc<dyn EnvironmentStore>,
    ) -> Result<Self, NodeError> {
        config.validate()?;

        let id = resolve_identity(&config.identity)?;
        let ack_target = config.ack_target(destination_factory.as_ref())?;
        let matcher =
            ServiceMatcher::new(id.clone()).with_config_names(config.config_names.iter().cloned());

        let codec: Arc<dyn EventCodec> = Arc::new(JsonCodec);
        let bridge = Arc::new(StreamBridge::new(
            transport.clone(),
            codec.clone(),
            config.destination.clone(),
        ));
        let local_bus = Arc::new(InMemoryEventBus::new());
        let consumer = Arc::new(BusConsumer::new(
            matcher.clone(),
            local_bus.clone(),
            bridge.clone(),
            config.features(),
            ack_target,
        ));
        let outbound = OutboundListener::new(matcher.clone(), bridge);
        let traces = Arc::new(TraceRepository::new(
            config.trace.capacity,
            config.trace.reverse,
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(
            service_id = %id,
            destination = %config.destination,
            ack = config.ack.enabled,
            trace = config.trace.enabled,
            "Fleet node created"
        );

        Ok(Self {
            config,
            matcher,
            local_bus,
            transport,
            codec,
            consumer,
            outbound,
            destination_factory,
            traces,
            environment,
            refreshes: Arc::new(AtomicU64::new(0)),
            dispatched: Arc::new(AtomicU64::new(0)),
            started: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    /// Subscribe to the bus and spawn the dispatch loop and local listeners.
    ///
    /// With the bus disabled this only logs; nothing is received or sent.
    pub async fn start(&self) -> Result<(), NodeError> {
        if *self.shutdown_rx.borrow() {
            return Err(NodeError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }
        if !self.config.enabled {
            info!(service_id = %self.service_id(), "Fleet bus disabled, node idle");
            return Ok(());
        }

        let receiver = self.transport.subscribe(&self.config.destination)?;
        let mut tasks = vec![self.spawn_dispatch_loop(receiver)];
        tasks.extend(self.spawn_listeners());
        self.tasks.lock().extend(tasks);

        info!(
            service_id = %self.service_id(),
            destination = %self.config.destination,
            "Fleet node started"
        );
        Ok(())
    }

    fn spawn_dispatch_loop(&self, mut receiver: TransportReceiver) -> JoinHandle<()> {
        let consumer = self.consumer.clone();
        let codec = self.codec.clone();
        let dispatched = self.dispatched.clone();
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    payload = receiver.recv() => {
                        let Some(payload) = payload else {
                            info!("Transport closed, dispatch loop stopped");
                            break;
                        };
                        let consumer = consumer.clone();
                        let codec = codec.clone();
                        let dispatched = dispatched.clone();
                        tokio::spawn(async move {
                            dispatch(codec.as_ref(), &consumer, &payload).await;
                            dispatched.fetch_add(1, Ordering::Release);
                        });
                    }
                    _ = shutdown.changed() => {
                        info!("Shutdown signal received, dispatch loop stopped");
                        break;
                    }
                }
            }
        })
    }

    fn spawn_listeners(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::with_capacity(4);

        let refresh = RefreshListener::new(
            self.local_bus.subscribe(refresh_filter()),
            self.matcher.clone(),
            self.refreshes.clone(),
        );
        tasks.push(self.spawn_until_shutdown("refresh", refresh.run()));

        let environment = EnvironmentListener::new(
            self.local_bus.subscribe(environment_filter()),
            self.matcher.clone(),
            self.environment.clone(),
        );
        tasks.push(self.spawn_until_shutdown("environment", environment.run()));

        let shutdown = ShutdownListener::new(
            self.local_bus.subscribe(shutdown_filter()),
            self.matcher.clone(),
            self.shutdown_tx.clone(),
        );
        tasks.push(self.spawn_until_shutdown("shutdown", shutdown.run()));

        if self.config.trace.enabled {
            let recorder = TraceRecorder::new(
                self.local_bus.subscribe(trace_filter()),
                TraceListener::new(self.traces.clone()),
            );
            tasks.push(self.spawn_until_shutdown("trace", recorder.run()));
        }

        tasks
    }

    fn spawn_until_shutdown<F>(&self, name: &'static str, listener: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = listener => {}
                _ = shutdown.changed() => {
                    debug!(listener = name, "Shutdown signal received");
                }
            }
        })
    }

    /// Publish a refresh request. Returns the event id.
    pub async fn publish_refresh(&self, destination: Option<&str>) -> Result<Uuid, NodeError> {
        let event =
            endpoints::refresh_event(self.service_id(), self.destination_factory.as_ref(), destination)?;
        self.publish(event).await
    }

    /// Publish an environment change. Returns the event id.
    pub async fn publish_environment_change(
        &self,
        values: BTreeMap<String, String>,
        destination: Option<&str>,
    ) -> Result<Uuid, NodeError> {
        let event = endpoints::environment_change_event(
            self.service_id(),
            self.destination_factory.as_ref(),
            values,
            destination,
        )?;
        self.publish(event).await
    }

    /// Publish a shutdown request. Returns the event id.
    ///
    /// A destination that matches this node stops it as well.
    pub async fn publish_shutdown(&self, destination: Option<&str>) -> Result<Uuid, NodeError> {
        let event =
            endpoints::shutdown_event(self.service_id(), self.destination_factory.as_ref(), destination)?;
        self.publish(event).await
    }

    /// Publish locally, then forward to the fleet.
    async fn publish(&self, event: EventEnvelope) -> Result<Uuid, NodeError> {
        if !self.config.enabled {
            return Err(NodeError::Disabled);
        }
        if *self.shutdown_rx.borrow() {
            return Err(NodeError::Stopped);
        }

        let id = event.id();
        let type_name = event.type_name().to_string();
        self.local_bus.publish(LocalEvent::Remote(event.clone())).await;

        if self.outbound.on_local_event(&event).await? {
            FLEET_BUS_MESSAGES_SENT
                .with_label_values(&[type_name.as_str()])
                .inc();
        }

        info!(
            event_id = %id,
            event_type = %type_name,
            destination = event.destination_service(),
            "Event published"
        );
        Ok(id)
    }

    /// Signal every task to stop and wait for them briefly.
    pub async fn shutdown(&self) {
        info!(service_id = %self.service_id(), "Initiating graceful shutdown...");
        self.shutdown_tx.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Task did not stop within the grace period");
            }
        }

        info!(service_id = %self.service_id(), "Shutdown complete");
    }

    /// Resolves once the node has been told to stop, locally or remotely.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.shutdown_rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub fn service_id(&self) -> &ServiceId {
        self.matcher.service_id()
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// The in-process event bus, for host listeners.
    pub fn local_bus(&self) -> &Arc<InMemoryEventBus> {
        &self.local_bus
    }

    /// Current trace records.
    #[must_use]
    pub fn traces(&self) -> Vec<TraceRecord> {
        self.traces.snapshot()
    }

    pub fn environment(&self) -> &Arc<dyn EnvironmentStore> {
        &self.environment
    }

    /// Refresh requests this node has handled.
    #[must_use]
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Inbound messages fully dispatched so far.
    #[must_use]
    pub fn messages_dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }
}

/// Decode and dispatch one inbound payload.
async fn dispatch(codec: &dyn EventCodec, consumer: &BusConsumer, payload: &[u8]) {
    let envelope = match codec.decode(payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            FLEET_BUS_DECODE_FAILURES.inc();
            warn!(error = %e, "Dropping undecodable bus message");
            return;
        }
    };

    FLEET_BUS_MESSAGES_RECEIVED
        .with_label_values(&[envelope.type_name()])
        .inc();
    if matches!(envelope.event(), RemoteEvent::Unknown { .. }) {
        FLEET_BUS_UNKNOWN_EVENTS.inc();
    }

    let event_id = envelope.id();
    match consumer.accept(envelope).await {
        Ok(outcome) => {
            if outcome.delivered() {
                FLEET_BUS_EVENTS_DELIVERED.inc();
            }
            if outcome.ack_id.is_some() {
                FLEET_BUS_ACKS_SENT.inc();
                FLEET_BUS_MESSAGES_SENT
                    .with_label_values(&[RemoteEvent::ACK])
                    .inc();
            }
        }
        Err(e) => {
            warn!(%event_id, error = %e, "Inbound dispatch failed");
        }
    }
}

impl std::fmt::Debug for FleetNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetNode")
            .field("service_id", self.service_id())
            .field("config", &self.config)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_bus::{InMemoryTransport, LocalEventFilter, LocalTopic};
    use std::time::Duration;
    use tokio::time::timeout;

    fn config(id: &str) -> BusConfig {
        let mut config = BusConfig::default();
        config.identity.id = Some(id.to_string());
        config
    }

    async fn wait_until<F: Fn() -> bool>(check: F) {
        timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = config("billing:8080");
        config.destination = String::new();
        let result = FleetNode::new(config, Arc::new(InMemoryTransport::new()));
        assert!(matches!(
            result,
            Err(NodeError::Config(ConfigError::EmptyDestination))
        ));
    }

    #[tokio::test]
    async fn test_start_twice() {
        let node = FleetNode::new(config("billing:8080"), Arc::new(InMemoryTransport::new())).unwrap();
        node.start().await.unwrap();
        assert!(matches!(node.start().await, Err(NodeError::AlreadyStarted)));
        node.shutdown().await;
        assert!(node.is_stopped());
    }

    #[tokio::test]
    async fn test_disabled_bus_does_not_publish() {
        let mut config = config("billing:8080");
        config.enabled = false;
        let transport = Arc::new(InMemoryTransport::new());
        let node = FleetNode::new(config, transport.clone()).unwrap();
        node.start().await.unwrap();

        assert!(matches!(
            node.publish_refresh(None).await,
            Err(NodeError::Disabled)
        ));
        assert_eq!(transport.subscriber_count("fleetBus"), 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_transport_and_local_bus() {
        let transport = Arc::new(InMemoryTransport::new());
        let mut wire = transport.subscribe("fleetBus").unwrap();
        let node = FleetNode::new(config("admin:9000"), transport.clone()).unwrap();
        let mut local = node.local_bus().subscribe(LocalEventFilter::topics(vec![LocalTopic::Refresh]));

        let id = node.publish_refresh(Some("billing")).await.unwrap();

        let payload = wire.try_recv().unwrap().expect("nothing on the wire");
        let decoded = JsonCodec.decode(&payload).unwrap();
        assert_eq!(decoded.id(), id);
        assert_eq!(decoded.destination_service(), "billing:**");

        let event = local.try_recv().unwrap().expect("nothing published locally");
        assert_eq!(event.envelope().map(EventEnvelope::id), Some(id));
    }

    #[tokio::test]
    async fn test_blank_environment_key_is_rejected_before_sending() {
        let transport = Arc::new(InMemoryTransport::new());
        let mut wire = transport.subscribe("fleetBus").unwrap();
        let node = FleetNode::new(config("admin:9000"), transport.clone()).unwrap();

        let mut values = BTreeMap::new();
        values.insert(String::new(), "on".to_string());
        assert!(matches!(
            node.publish_environment_change(values, None).await,
            Err(NodeError::Endpoint(EndpointError::BlankEnvironmentKey))
        ));
        assert_eq!(wire.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_own_shutdown_request_stops_node() {
        let transport = Arc::new(InMemoryTransport::new());
        let node = FleetNode::new(config("billing:dev:8080"), transport).unwrap();
        node.start().await.unwrap();

        node.publish_shutdown(Some("billing")).await.unwrap();
        timeout(Duration::from_secs(2), node.wait_for_shutdown())
            .await
            .expect("node did not stop");
        assert!(node.is_stopped());
        assert!(matches!(
            node.publish_refresh(None).await,
            Err(NodeError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_own_event_is_not_redelivered() {
        let transport = Arc::new(InMemoryTransport::new());
        let node = FleetNode::new(config("billing:dev:8080"), transport).unwrap();
        node.start().await.unwrap();

        node.publish_refresh(None).await.unwrap();
        // The refresh echo plus the ack it triggered.
        wait_until(|| node.messages_dispatched() >= 2).await;
        wait_until(|| node.refresh_count() == 1).await;

        // Only the local publish counted; the echo from the transport is ours.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(node.refresh_count(), 1);
        node.shutdown().await;
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_dropped() {
        let transport = Arc::new(InMemoryTransport::new());
        let node = FleetNode::new(config("billing:dev:8080"), transport.clone()).unwrap();
        node.start().await.unwrap();

        transport.publish("fleetBus", b"garbage".to_vec()).await.unwrap();
        wait_until(|| node.messages_dispatched() >= 1).await;
        assert!(!node.is_stopped());
        node.shutdown().await;
    }
}
