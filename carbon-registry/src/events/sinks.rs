//! Built-in event sinks.

use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{EventSink, RegistryEvent, RegistryEventKind};

/// Logs each event at `info`.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &RegistryEvent) {
        match &event.kind {
            RegistryEventKind::FarmerRegistered {
                identity,
                name,
                location,
            } => info!(
                event_id = %event.id,
                identity = %identity,
                name = %name,
                location = %location,
                "Farmer registered"
            ),
            RegistryEventKind::CarbonReductionRecorded {
                identity,
                amount,
                total,
                sequence,
            } => info!(
                event_id = %event.id,
                identity = %identity,
                amount = amount,
                total = total,
                sequence = sequence,
                "Carbon reduction recorded"
            ),
        }
    }
}

/// Fans events out to async subscribers.
///
/// Slow receivers lag and drop old events; that never affects the
/// registry call that emitted them.
#[derive(Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<RegistryEvent>,
    capacity: usize,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Events retained per receiver before it lags.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open a new receiver. It sees events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: &RegistryEvent) {
        if self.sender.send(event.clone()).is_err() {
            debug!(event_id = %event.id, kind = event.kind.as_str(), "No broadcast receivers");
        }
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<RegistryEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all events received so far.
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.lock().clone()
    }

    /// Number of events received.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all retained events.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RegistryEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for MemorySink {
    fn publish(&self, event: &RegistryEvent) {
        self.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;

    fn registered(id: &str) -> RegistryEvent {
        RegistryEvent::new(RegistryEventKind::FarmerRegistered {
            identity: Identity::new(id),
            name: "Ann".to_string(),
            location: "North".to_string(),
        })
    }

    #[tokio::test]
    async fn test_broadcast_reaches_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        assert_eq!(sink.receiver_count(), 1);
        assert_eq!(sink.capacity(), 8);

        let event = registered("a");
        sink.publish(&event);

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_broadcast_without_receivers_is_silent() {
        let sink = BroadcastSink::new(8);
        sink.publish(&registered("a"));
        assert_eq!(sink.receiver_count(), 0);
    }

    #[test]
    fn test_memory_sink_retains_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.publish(&registered("a"));
        sink.publish(&registered("b"));

        let ids: Vec<_> = sink
            .events()
            .iter()
            .map(|e| e.kind.identity().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        sink.clear();
        assert_eq!(sink.len(), 0);
    }
}
