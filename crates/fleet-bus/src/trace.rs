//! # Trace Store
//!
//! Bounded, in-process audit trail of bus traffic.
//!
//! The repository is a ring buffer of [`TraceRecord`]s. With `reverse` set
//! (the default) the newest record sits at the head; otherwise records are
//! kept in arrival order. Either way the oldest record is evicted once the
//! buffer is full.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use fleet_types::{TraceRecord, TraceSignal};

use crate::events::LocalEvent;
use crate::DEFAULT_TRACE_CAPACITY;

/// Ring buffer of trace records, safe to write from many dispatch tasks.
#[derive(Debug)]
pub struct TraceRepository {
    records: Mutex<VecDeque<TraceRecord>>,
    capacity: usize,
    reverse: bool,
}

impl TraceRepository {
    #[must_use]
    pub fn new(capacity: usize, reverse: bool) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            reverse,
        }
    }

    /// Store a record, evicting the oldest one if full.
    pub fn add(&self, record: TraceRecord) {
        if self.capacity == 0 {
            return;
        }

        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            if self.reverse {
                records.pop_back();
            } else {
                records.pop_front();
            }
        }
        if self.reverse {
            records.push_front(record);
        } else {
            records.push_back(record);
        }
    }

    /// Copy of the current contents, in storage order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<TraceRecord> {
        self.records.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.reverse
    }
}

impl Default for TraceRepository {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY, true)
    }
}

/// Turns sent notices and acks seen on the local bus into trace records.
#[derive(Debug, Clone)]
pub struct TraceListener {
    repository: Arc<TraceRepository>,
}

impl TraceListener {
    pub fn new(repository: Arc<TraceRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<TraceRepository> {
        &self.repository
    }

    /// Record `event` if it is traceable. Returns the signal recorded.
    pub fn on_event(&self, event: &LocalEvent) -> Option<TraceSignal> {
        let record = match event {
            LocalEvent::Sent(sent) => TraceRecord::sent(sent),
            LocalEvent::Remote(envelope) => TraceRecord::ack_received(envelope)?,
        };

        debug!(
            signal = %record.signal,
            event_id = %record.id,
            origin = %record.origin,
            destination = %record.destination,
            "Trace record written"
        );

        let signal = record.signal;
        self.repository.add(record);
        Some(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{DestinationPattern, EventEnvelope, RemoteEvent, SentEvent, ServiceId};
    use std::thread;
    use uuid::Uuid;

    fn record(n: u128) -> TraceRecord {
        let event = EventEnvelope::from_parts(
            Uuid::from_u128(n),
            "billing:8080".to_string(),
            "**".to_string(),
            0,
            RemoteEvent::Refresh,
        );
        TraceRecord::sent(&SentEvent::observed(&event))
    }

    fn ids(repo: &TraceRepository) -> Vec<u128> {
        repo.snapshot().iter().map(|r| r.id.as_u128()).collect()
    }

    #[test]
    fn test_reverse_keeps_newest_at_head() {
        let repo = TraceRepository::new(3, true);
        for n in 1..=5 {
            repo.add(record(n));
        }
        assert_eq!(ids(&repo), vec![5, 4, 3]);
    }

    #[test]
    fn test_forward_keeps_arrival_order() {
        let repo = TraceRepository::new(3, false);
        for n in 1..=5 {
            repo.add(record(n));
        }
        assert_eq!(ids(&repo), vec![3, 4, 5]);
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let repo = TraceRepository::new(0, true);
        repo.add(record(1));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let repo = TraceRepository::default();
        repo.add(record(1));
        let snapshot = repo.snapshot();
        repo.add(record(2));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.capacity(), DEFAULT_TRACE_CAPACITY);
    }

    #[test]
    fn test_concurrent_writers_respect_capacity() {
        let repo = Arc::new(TraceRepository::new(50, true));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let repo = repo.clone();
                thread::spawn(move || {
                    for n in 0..100 {
                        repo.add(record(t * 1000 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(repo.len(), 50);
    }

    #[test]
    fn test_listener_records_sent_and_ack() {
        let listener = TraceListener::new(Arc::new(TraceRepository::default()));
        let origin = ServiceId::new("billing:8080").unwrap();
        let responder = ServiceId::new("orders:9090").unwrap();

        let event = EventEnvelope::new(&origin, DestinationPattern::from("orders"), RemoteEvent::Refresh);
        let ack = EventEnvelope::ack_for(&event, &responder, DestinationPattern::from("billing:8080"));

        assert_eq!(
            listener.on_event(&LocalEvent::Sent(SentEvent::observed(&event))),
            Some(TraceSignal::Sent)
        );
        assert_eq!(listener.on_event(&LocalEvent::Remote(ack)), Some(TraceSignal::Ack));
        assert_eq!(listener.on_event(&LocalEvent::Remote(event.clone())), None);

        let records = listener.repository().snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].signal, TraceSignal::Ack);
        assert_eq!(records[0].id, event.id());
        assert_eq!(records[0].origin, "orders:9090");
        assert_eq!(records[1].signal, TraceSignal::Sent);
    }
}
