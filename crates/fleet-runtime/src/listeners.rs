//! # Local Listeners
//!
//! React to remote events the consumer delivered to this process. Every
//! listener re-checks that the event is addressed here, since events this
//! node raises itself are also published locally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use fleet_bus::{
    EnvironmentStore, LocalEventFilter, LocalTopic, ServiceMatcher, Subscription, TraceListener,
};
use fleet_telemetry::FLEET_BUS_TRACE_RECORDS;
use fleet_types::RemoteEvent;

/// Filter for the refresh listener.
pub fn refresh_filter() -> LocalEventFilter {
    LocalEventFilter::topics(vec![LocalTopic::Refresh])
}

/// Filter for the environment listener.
pub fn environment_filter() -> LocalEventFilter {
    LocalEventFilter::topics(vec![LocalTopic::EnvironmentChange])
}

/// Filter for the shutdown listener.
pub fn shutdown_filter() -> LocalEventFilter {
    LocalEventFilter::topics(vec![LocalTopic::Shutdown])
}

/// Filter for the trace listener.
pub fn trace_filter() -> LocalEventFilter {
    LocalEventFilter::topics(vec![LocalTopic::Sent, LocalTopic::Ack])
}

/// Counts refresh requests addressed to this node.
pub struct RefreshListener {
    subscription: Subscription,
    matcher: ServiceMatcher,
    refreshes: Arc<AtomicU64>,
}

impl RefreshListener {
    pub fn new(subscription: Subscription, matcher: ServiceMatcher, refreshes: Arc<AtomicU64>) -> Self {
        Self {
            subscription,
            matcher,
            refreshes,
        }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.subscription.recv().await {
            let Some(envelope) = event.envelope() else {
                continue;
            };
            if !self.matcher.is_for_self(envelope) {
                continue;
            }
            let count = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;
            info!(
                event_id = %envelope.id(),
                origin = envelope.origin_service(),
                refreshes = count,
                "Received remote refresh request"
            );
        }
    }
}

/// Applies environment changes to the store.
pub struct EnvironmentListener {
    subscription: Subscription,
    matcher: ServiceMatcher,
    store: Arc<dyn EnvironmentStore>,
}

impl EnvironmentListener {
    pub fn new(
        subscription: Subscription,
        matcher: ServiceMatcher,
        store: Arc<dyn EnvironmentStore>,
    ) -> Self {
        Self {
            subscription,
            matcher,
            store,
        }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.subscription.recv().await {
            let Some(envelope) = event.envelope() else {
                continue;
            };
            let RemoteEvent::EnvironmentChange { values } = envelope.event() else {
                continue;
            };
            if !self.matcher.is_for_self(envelope) {
                continue;
            }
            for (key, value) in values {
                self.store.set(key, value);
            }
            info!(
                event_id = %envelope.id(),
                origin = envelope.origin_service(),
                keys = values.len(),
                "Applied remote environment change"
            );
        }
    }
}

/// Turns a shutdown request addressed here into the node's stop signal.
pub struct ShutdownListener {
    subscription: Subscription,
    matcher: ServiceMatcher,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl ShutdownListener {
    pub fn new(
        subscription: Subscription,
        matcher: ServiceMatcher,
        shutdown_tx: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            subscription,
            matcher,
            shutdown_tx,
        }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.subscription.recv().await {
            let Some(envelope) = event.envelope() else {
                continue;
            };
            if !self.matcher.is_for_self(envelope) {
                continue;
            }
            warn!(
                event_id = %envelope.id(),
                origin = envelope.origin_service(),
                "Received remote shutdown request, stopping"
            );
            self.shutdown_tx.send_replace(true);
            return;
        }
    }
}

/// Feeds the trace repository from the local bus.
pub struct TraceRecorder {
    subscription: Subscription,
    listener: TraceListener,
}

impl TraceRecorder {
    pub fn new(subscription: Subscription, listener: TraceListener) -> Self {
        Self {
            subscription,
            listener,
        }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.subscription.recv().await {
            if let Some(signal) = self.listener.on_event(&event) {
                FLEET_BUS_TRACE_RECORDS
                    .with_label_values(&[signal.as_str()])
                    .inc();
            }
        }
    }
}
