//! # Bus Consumer
//!
//! Dispatch core. Every inbound envelope gets one pass through
//! [`BusConsumer::accept`], which decides three independent things:
//!
//! 1. **Deliver**: publish locally if the envelope is for this instance and
//!    did not come from it.
//! 2. **Ack**: if acking is enabled and the envelope is for this instance,
//!    send an ack out through the bridge and publish it locally.
//! 3. **Trace**: if tracing is enabled, publish a sent notice for every
//!    non-ack envelope seen, addressed to us or not.
//!
//! Acks short-circuit: an inbound ack is published locally for audit (when
//! tracing, and only if someone else sent it) and never acked in turn.
//!
//! Within one call the order is always deliver, then ack, then trace. The
//! consumer holds no per-message state, so calls may run concurrently.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use fleet_types::{EventEnvelope, SentEvent};

use crate::bridge::BusBridge;
use crate::destination::AckTarget;
use crate::errors::BusError;
use crate::events::LocalEvent;
use crate::matcher::ServiceMatcher;
use crate::publisher::LocalEventPublisher;

/// Independent feature switches of the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFeatures {
    pub ack_enabled: bool,
    pub trace_enabled: bool,
}

impl Default for BusFeatures {
    fn default() -> Self {
        Self {
            ack_enabled: true,
            trace_enabled: false,
        }
    }
}

/// Which branch an envelope took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// An ack published locally for audit.
    AckAudited,
    /// Not delivered and not acked.
    Drop,
    /// Delivered locally, no ack.
    Deliver,
    /// Delivered locally and acked.
    DeliverAndAck,
    /// Addressed to us but raised by us: acked only.
    AckOnly,
}

/// Result of one [`BusConsumer::accept`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub disposition: Disposition,
    /// Id of the ack envelope emitted, if any.
    pub ack_id: Option<Uuid>,
    /// Whether a sent notice was published.
    pub traced: bool,
}

impl DispatchOutcome {
    #[must_use]
    pub fn delivered(&self) -> bool {
        matches!(
            self.disposition,
            Disposition::Deliver | Disposition::DeliverAndAck
        )
    }
}

/// Per-instance dispatcher for inbound envelopes.
pub struct BusConsumer {
    matcher: ServiceMatcher,
    publisher: Arc<dyn LocalEventPublisher>,
    bridge: Arc<dyn BusBridge>,
    features: BusFeatures,
    ack_target: AckTarget,
}

impl BusConsumer {
    pub fn new(
        matcher: ServiceMatcher,
        publisher: Arc<dyn LocalEventPublisher>,
        bridge: Arc<dyn BusBridge>,
        features: BusFeatures,
        ack_target: AckTarget,
    ) -> Self {
        Self {
            matcher,
            publisher,
            bridge,
            features,
            ack_target,
        }
    }

    pub fn matcher(&self) -> &ServiceMatcher {
        &self.matcher
    }

    pub fn features(&self) -> BusFeatures {
        self.features
    }

    /// Dispatch one inbound envelope.
    ///
    /// A failed ack send is returned as an error. Local delivery that already
    /// happened is not undone, and the trace step is skipped.
    pub async fn accept(&self, event: EventEnvelope) -> Result<DispatchOutcome, BusError> {
        if event.is_ack() {
            return Ok(self.audit_ack(event).await);
        }

        let for_self = self.matcher.is_for_self(&event);
        let from_self = self.matcher.is_from_self(&event);

        let mut delivered = false;
        let mut ack_id = None;

        if for_self {
            if !from_self {
                self.publisher.publish(LocalEvent::Remote(event.clone())).await;
                delivered = true;
            }

            if self.features.ack_enabled {
                ack_id = Some(self.send_ack(&event).await?);
            }
        }

        let traced = if self.features.trace_enabled {
            self.publisher
                .publish(LocalEvent::Sent(SentEvent::observed(&event)))
                .await;
            true
        } else {
            false
        };

        let disposition = match (delivered, ack_id.is_some()) {
            (true, true) => Disposition::DeliverAndAck,
            (true, false) => Disposition::Deliver,
            (false, true) => Disposition::AckOnly,
            (false, false) => Disposition::Drop,
        };

        debug!(
            event_id = %event.id(),
            event_type = event.type_name(),
            origin = event.origin_service(),
            destination = event.destination_service(),
            for_self,
            from_self,
            ?disposition,
            traced,
            "Inbound event dispatched"
        );

        Ok(DispatchOutcome {
            disposition,
            ack_id,
            traced,
        })
    }

    async fn audit_ack(&self, ack: EventEnvelope) -> DispatchOutcome {
        let audited = self.features.trace_enabled && !self.matcher.is_from_self(&ack);
        debug!(
            event_id = %ack.id(),
            origin = ack.origin_service(),
            audited,
            "Inbound ack"
        );

        if audited {
            self.publisher.publish(LocalEvent::Remote(ack)).await;
        }

        DispatchOutcome {
            disposition: if audited {
                Disposition::AckAudited
            } else {
                Disposition::Drop
            },
            ack_id: None,
            traced: false,
        }
    }

    async fn send_ack(&self, event: &EventEnvelope) -> Result<Uuid, BusError> {
        let destination = self.ack_target.resolve(event.origin_service());
        let ack = EventEnvelope::ack_for(event, self.matcher.service_id(), destination);
        let ack_id = ack.id();

        self.bridge.send(&ack).await?;
        self.publisher.publish(LocalEvent::Remote(ack)).await;

        debug!(
            event_id = %event.id(),
            %ack_id,
            "Ack sent"
        );
        Ok(ack_id)
    }
}

impl std::fmt::Debug for BusConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusConsumer")
            .field("matcher", &self.matcher)
            .field("features", &self.features)
            .field("ack_target", &self.ack_target)
            .finish_non_exhaustive()
    }
}
