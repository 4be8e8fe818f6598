//! # Delivery, Ack and Trace Across Nodes
//!
//! ## Scenarios
//!
//! 1. **Ack fan-in**: one event, N matching receivers, N acks back at the origin
//! 2. **Broadcast**: every node handles a fleet-wide event exactly once
//! 3. **Multi-profile with ack and trace**: a node running two profiles is
//!    addressed through one of them while both features are on

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use fleet_types::{TraceRecord, TraceSignal};

    use crate::integration::harness::{default_config, wait_until, with_trace, Fleet, Tweak};

    fn count(records: &[TraceRecord], signal: TraceSignal) -> usize {
        records.iter().filter(|r| r.signal == signal).count()
    }

    #[tokio::test]
    async fn test_ack_fan_in_reaches_origin() {
        let fleet = Fleet::start(&[
            ("admin:9000", with_trace as Tweak),
            ("orders:prod:1", default_config as Tweak),
            ("orders:prod:2", default_config as Tweak),
            ("inventory:prod:3", default_config as Tweak),
        ])
        .await;
        let admin = fleet.node("admin:9000");

        let event_id = admin.publish_refresh(Some("orders")).await.unwrap();

        // The refresh plus one ack per orders instance.
        fleet.wait_dispatched(3).await;
        wait_until(|| fleet.node("orders:prod:1").refresh_count() == 1).await;
        wait_until(|| fleet.node("orders:prod:2").refresh_count() == 1).await;
        wait_until(|| admin.traces().len() == 3).await;

        assert_eq!(fleet.node("inventory:prod:3").refresh_count(), 0);
        assert_eq!(admin.refresh_count(), 0);

        let traces = admin.traces();
        let acks: Vec<_> = traces
            .iter()
            .filter(|r| r.signal == TraceSignal::Ack)
            .collect();
        assert_eq!(acks.len(), 2);
        assert!(acks.iter().all(|r| r.id == event_id));
        assert!(acks.iter().all(|r| r.destination.starts_with("admin:9000")));
        assert!(acks.iter().all(|r| r.event_type == "refresh"));

        let origins: BTreeSet<_> = acks.iter().map(|r| r.origin.as_str()).collect();
        assert_eq!(
            origins,
            BTreeSet::from(["orders:prod:1", "orders:prod:2"])
        );

        let sent: Vec<_> = traces
            .iter()
            .filter(|r| r.signal == TraceSignal::Sent)
            .collect();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, event_id);
        assert_eq!(sent[0].destination, "orders:**");

        fleet.shutdown().await;
    }

    #[tokio::test]
    async fn test_broadcast_is_handled_once_per_node() {
        let fleet = Fleet::with_defaults(&["a:1", "b:2", "c:3"]).await;

        fleet.node("a:1").publish_refresh(None).await.unwrap();

        // The refresh plus an ack from every node, the origin included.
        fleet.wait_dispatched(4).await;
        for node in &fleet.nodes {
            wait_until(|| node.refresh_count() >= 1).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        for node in &fleet.nodes {
            assert_eq!(node.refresh_count(), 1, "{}", node.service_id());
        }
        fleet.shutdown().await;
    }

    #[tokio::test]
    async fn test_multi_profile_with_ack_and_trace() {
        let fleet = Fleet::start(&[
            ("admin:9000", with_trace as Tweak),
            ("inventory:prod,cloud:9002", with_trace as Tweak),
            ("inventory:prod:9003", with_trace as Tweak),
        ])
        .await;
        let admin = fleet.node("admin:9000");
        let multi = fleet.node("inventory:prod,cloud:9002");
        let single = fleet.node("inventory:prod:9003");

        let event_id = admin.publish_refresh(Some("inventory:cloud:*")).await.unwrap();

        // The refresh plus the ack from the multi-profile node.
        fleet.wait_dispatched(2).await;
        wait_until(|| multi.refresh_count() == 1).await;
        wait_until(|| admin.traces().len() == 2).await;
        wait_until(|| multi.traces().len() == 2).await;
        wait_until(|| single.traces().len() == 2).await;

        assert_eq!(single.refresh_count(), 0);

        // Origin: its own sent notice plus the ack.
        let admin_traces = admin.traces();
        assert_eq!(count(&admin_traces, TraceSignal::Sent), 1);
        let ack = admin_traces
            .iter()
            .find(|r| r.signal == TraceSignal::Ack)
            .expect("no ack traced");
        assert_eq!(ack.id, event_id);
        assert_eq!(ack.origin, "inventory:prod,cloud:9002");

        // Addressed node: the ack it emitted, published locally, and the sent notice.
        let multi_traces = multi.traces();
        assert_eq!(count(&multi_traces, TraceSignal::Sent), 1);
        assert_eq!(count(&multi_traces, TraceSignal::Ack), 1);

        // Bystander: traffic observed, nothing delivered.
        let single_traces = single.traces();
        assert_eq!(count(&single_traces, TraceSignal::Sent), 1);
        assert_eq!(count(&single_traces, TraceSignal::Ack), 1);

        // A port mismatch is traced everywhere and delivered nowhere.
        admin
            .publish_refresh(Some("inventory:cloud:9999"))
            .await
            .unwrap();
        fleet.wait_dispatched(3).await;
        wait_until(|| multi.traces().len() == 3).await;
        assert_eq!(multi.refresh_count(), 1);
        assert_eq!(count(&multi.traces(), TraceSignal::Ack), 1);

        fleet.shutdown().await;
    }
}
