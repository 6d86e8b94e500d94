//! Registry events for external observers.
//!
//! The registry publishes an event after each committed state change.
//! Audit and indexing collaborators attach an [`EventSink`] to the
//! [`EventBus`]; the registry never reads its own events back.

pub mod audit;
pub mod sinks;

pub use audit::JsonlAuditSink;
pub use sinks::{BroadcastSink, MemorySink, TracingSink};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::EventsConfig;
use crate::types::Identity;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEventKind {
    /// A new farmer was onboarded
    FarmerRegistered {
        identity: Identity,
        name: String,
        location: String,
    },
    /// A contribution was added to a farmer's total
    CarbonReductionRecorded {
        identity: Identity,
        amount: u64,
        total: u64,
        sequence: u64,
    },
}

impl RegistryEventKind {
    /// Identity the event concerns.
    pub fn identity(&self) -> &Identity {
        match self {
            Self::FarmerRegistered { identity, .. } => identity,
            Self::CarbonReductionRecorded { identity, .. } => identity,
        }
    }

    /// Short name for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FarmerRegistered { .. } => "farmer_registered",
            Self::CarbonReductionRecorded { .. } => "carbon_reduction_recorded",
        }
    }
}

/// An emitted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEvent {
    /// Unique event ID
    pub id: String,
    /// When the event was emitted
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: RegistryEventKind,
}

impl RegistryEvent {
    /// Wrap an event kind with a fresh ID and timestamp.
    pub fn new(kind: RegistryEventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            emitted_at: Utc::now(),
            kind,
        }
    }

    /// Convert to a JSONL line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receiver of registry events.
///
/// Publishing cannot fail the registry operation that produced the event;
/// sinks report their own delivery problems through `tracing`.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn publish(&self, event: &RegistryEvent);
}

/// Ordered list of subscribed sinks.
#[derive(Clone, Default)]
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
    /// Channel built from configuration, if any
    broadcast: Option<BroadcastSink>,
}

impl EventBus {
    /// Create a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the sinks named by configuration.
    pub fn from_config(config: &EventsConfig) -> std::io::Result<Self> {
        let mut bus = Self::new();
        let broadcast = BroadcastSink::new(config.broadcast_capacity);
        bus.subscribe(Arc::new(broadcast.clone()));
        bus.broadcast = Some(broadcast);
        if config.log_events {
            bus.subscribe(Arc::new(TracingSink));
        }
        if let Some(path) = &config.audit_log_path {
            bus.subscribe(Arc::new(JsonlAuditSink::open(path)?));
        }
        Ok(bus)
    }

    /// Attach a sink.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// The configured broadcast channel.
    pub fn broadcast(&self) -> Option<&BroadcastSink> {
        self.broadcast.as_ref()
    }

    /// Open a receiver on the configured broadcast channel.
    pub fn subscribe_channel(&self) -> Option<broadcast::Receiver<RegistryEvent>> {
        self.broadcast.as_ref().map(BroadcastSink::subscribe)
    }

    /// Number of attached sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Wrap and deliver an event to every sink in subscription order.
    pub fn emit(&self, kind: RegistryEventKind) -> RegistryEvent {
        let event = RegistryEvent::new(kind);
        for sink in &self.sinks {
            sink.publish(&event);
        }
        event
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("sinks", &self.sinks.len())
            .field("broadcast", &self.broadcast.as_ref().map(BroadcastSink::capacity))
            .finish()
    }
}
