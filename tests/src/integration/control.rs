//! # Control Events
//!
//! Environment changes, remote shutdown, alias addressing, tagged
//! destinations and events of a type this build does not know.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;
    use uuid::Uuid;

    use fleet_bus::{
        EventCodec, InMemoryEnvironment, InMemoryTransport, JsonCodec, LocalEventFilter,
        LocalTopic, TaggedDestinationFactory, Transport,
    };
    use fleet_runtime::{BusConfig, FleetNode};
    use fleet_types::{RemoteEvent, TraceSignal};

    use crate::integration::harness::{
        default_config, wait_until, with_trace, Fleet, Tweak, SETTLE_TIMEOUT,
    };

    fn legacy_alias(config: &mut BusConfig) {
        config.config_names = vec!["legacy-orders".to_string()];
    }

    #[tokio::test]
    async fn test_environment_change_applies_to_addressed_nodes() {
        let fleet = Fleet::with_defaults(&["admin:9000", "orders:prod:1", "inventory:prod:3"]).await;

        let mut values = BTreeMap::new();
        values.insert("feature.x".to_string(), "on".to_string());
        fleet
            .node("admin:9000")
            .publish_environment_change(values, Some("orders"))
            .await
            .unwrap();

        // The change plus the ack from orders.
        fleet.wait_dispatched(2).await;
        let orders = fleet.node("orders:prod:1");
        wait_until(|| orders.environment().get("feature.x").as_deref() == Some("on")).await;

        assert_eq!(fleet.node("inventory:prod:3").environment().get("feature.x"), None);
        assert_eq!(fleet.node("admin:9000").environment().get("feature.x"), None);
        fleet.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_shutdown_stops_only_addressed_node() {
        let fleet = Fleet::with_defaults(&["admin:9000", "orders:prod:1", "inventory:prod:3"]).await;

        fleet
            .node("admin:9000")
            .publish_shutdown(Some("inventory"))
            .await
            .unwrap();

        let inventory = fleet.node("inventory:prod:3");
        timeout(SETTLE_TIMEOUT, inventory.wait_for_shutdown())
            .await
            .expect("inventory did not stop");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(inventory.is_stopped());
        assert!(!fleet.node("orders:prod:1").is_stopped());
        assert!(!fleet.node("admin:9000").is_stopped());
        fleet.shutdown().await;
    }

    #[tokio::test]
    async fn test_alias_addressing() {
        let fleet = Fleet::start(&[
            ("admin:9000", default_config as Tweak),
            ("orders:prod:1", legacy_alias as Tweak),
        ])
        .await;

        fleet
            .node("admin:9000")
            .publish_refresh(Some("legacy-orders"))
            .await
            .unwrap();

        let orders = fleet.node("orders:prod:1");
        wait_until(|| orders.refresh_count() == 1).await;
        fleet.shutdown().await;
    }

    #[tokio::test]
    async fn test_tagged_destination() {
        let fleet = Fleet::with_defaults(&["orders:prod:1", "orders:dev:2"]).await;

        let mut config = BusConfig::default();
        config.identity.id = Some("admin:9000".to_string());
        let admin = FleetNode::with_parts(
            config,
            fleet.transport.clone(),
            Arc::new(TaggedDestinationFactory::default()),
            Arc::new(InMemoryEnvironment::new()),
        )
        .unwrap();
        admin.start().await.unwrap();

        admin
            .publish_refresh(Some("service=orders;profile=prod"))
            .await
            .unwrap();

        // The refresh plus the ack from orders:prod.
        fleet.wait_dispatched(2).await;
        wait_until(|| fleet.node("orders:prod:1").refresh_count() == 1).await;
        assert_eq!(fleet.node("orders:dev:2").refresh_count(), 0);

        admin.shutdown().await;
        fleet.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_event_is_delivered_acked_and_traced() {
        let fleet = Fleet::start(&[("orders:prod:1", with_trace as Tweak)]).await;
        let orders = fleet.node("orders:prod:1");
        let mut local = orders
            .local_bus()
            .subscribe(LocalEventFilter::topics(vec![LocalTopic::Unknown]));
        let mut wire = fleet.transport.subscribe("fleetBus").unwrap();

        let id = Uuid::new_v4();
        let payload = serde_json::to_vec(&json!({
            "type": "cache_flush",
            "id": id.to_string(),
            "originService": "cache:prod:7",
            "destinationService": "orders:**",
            "region": "eu",
        }))
        .unwrap();
        fleet
            .transport
            .publish("fleetBus", payload.clone())
            .await
            .unwrap();

        let delivered = timeout(SETTLE_TIMEOUT, local.recv())
            .await
            .expect("timeout")
            .expect("closed");
        let envelope = delivered.envelope().expect("remote event");
        assert_eq!(envelope.id(), id);
        assert_eq!(envelope.origin_service(), "cache:prod:7");
        assert!(matches!(envelope.event(), RemoteEvent::Unknown { .. }));

        // First the original bytes, then the ack.
        let echoed = timeout(SETTLE_TIMEOUT, wire.recv()).await.unwrap().unwrap();
        assert_eq!(echoed, payload);
        let ack_bytes = timeout(SETTLE_TIMEOUT, wire.recv()).await.unwrap().unwrap();
        let ack = JsonCodec.decode(&ack_bytes).unwrap();
        let ack = ack.as_ack().expect("not an ack").clone();
        assert_eq!(ack.ack_id, id);
        assert_eq!(ack.event_type, "cache_flush");
        assert_eq!(ack.ack_destination_service, "cache:prod:7");

        wait_until(|| {
            orders
                .traces()
                .iter()
                .any(|r| r.signal == TraceSignal::Sent && r.event_type == "cache_flush")
        })
        .await;
        fleet.shutdown().await;
    }

    #[tokio::test]
    async fn test_fleet_survives_garbage_on_the_wire() {
        let transport = Arc::new(InMemoryTransport::new());
        let mut config = BusConfig::default();
        config.identity.id = Some("orders:prod:1".to_string());
        let node = FleetNode::new(config, transport.clone()).unwrap();
        node.start().await.unwrap();

        transport.publish("fleetBus", b"{not json".to_vec()).await.unwrap();
        transport
            .publish("fleetBus", br#"{"id":"x"}"#.to_vec())
            .await
            .unwrap();
        wait_until(|| node.messages_dispatched() >= 2).await;

        node.publish_refresh(None).await.unwrap();
        wait_until(|| node.refresh_count() == 1).await;
        node.shutdown().await;
    }
}
