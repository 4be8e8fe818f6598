//! # Local Events
//!
//! What the consumer hands to in-process listeners. Local events never
//! leave the process.

use fleet_types::{EventEnvelope, RemoteEvent, SentEvent};

/// An event published on the local event bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEvent {
    /// A remote event delivered to this instance (or an ack, for audit).
    Remote(EventEnvelope),
    /// The consumer saw an event go by.
    Sent(SentEvent),
}

impl LocalEvent {
    /// Get the topic for this event (for filtering).
    #[must_use]
    pub fn topic(&self) -> LocalTopic {
        match self {
            Self::Remote(envelope) => match envelope.event() {
                RemoteEvent::Refresh => LocalTopic::Refresh,
                RemoteEvent::EnvironmentChange { .. } => LocalTopic::EnvironmentChange,
                RemoteEvent::Ack(_) => LocalTopic::Ack,
                RemoteEvent::Shutdown => LocalTopic::Shutdown,
                RemoteEvent::Unknown { .. } => LocalTopic::Unknown,
            },
            Self::Sent(_) => LocalTopic::Sent,
        }
    }

    /// The carried envelope, if this is a remote event.
    #[must_use]
    pub fn envelope(&self) -> Option<&EventEnvelope> {
        match self {
            Self::Remote(envelope) => Some(envelope),
            Self::Sent(_) => None,
        }
    }
}

/// Local event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalTopic {
    Refresh,
    EnvironmentChange,
    Ack,
    Shutdown,
    /// Events with an unrecognised discriminator.
    Unknown,
    /// Trace notices from the consumer.
    Sent,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific local events.
#[derive(Debug, Clone, Default)]
pub struct LocalEventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<LocalTopic>,
}

impl LocalEventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<LocalTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &LocalEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&LocalTopic::All)
            || self.topics.contains(&event.topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_types::{DestinationPattern, ServiceId};

    fn remote(event: RemoteEvent) -> LocalEvent {
        LocalEvent::Remote(EventEnvelope::new(
            &ServiceId::new("billing:8080").unwrap(),
            DestinationPattern::all(),
            event,
        ))
    }

    #[test]
    fn test_topic_mapping() {
        assert_eq!(remote(RemoteEvent::Refresh).topic(), LocalTopic::Refresh);
        assert_eq!(remote(RemoteEvent::Shutdown).topic(), LocalTopic::Shutdown);

        let envelope = EventEnvelope::new(
            &ServiceId::new("billing:8080").unwrap(),
            DestinationPattern::all(),
            RemoteEvent::Refresh,
        );
        let sent = LocalEvent::Sent(SentEvent::observed(&envelope));
        assert_eq!(sent.topic(), LocalTopic::Sent);
        assert!(sent.envelope().is_none());
    }

    #[test]
    fn test_filter_all() {
        let filter = LocalEventFilter::all();
        assert!(filter.matches(&remote(RemoteEvent::Refresh)));
        assert!(LocalEventFilter::topics(vec![LocalTopic::All]).matches(&remote(RemoteEvent::Shutdown)));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = LocalEventFilter::topics(vec![LocalTopic::Refresh]);
        assert!(filter.matches(&remote(RemoteEvent::Refresh)));
        assert!(!filter.matches(&remote(RemoteEvent::Shutdown)));
    }
}
