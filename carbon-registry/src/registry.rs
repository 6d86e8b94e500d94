//! The farmer registry state machine.
//!
//! Writers take `&mut self`, so one call always runs to completion before the
//! next begins. Every precondition is checked before the store is touched and
//! events are emitted only after the store accepted the change.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, LimitsConfig, RegistryConfig};
use crate::error::{RegistryError, Result};
use crate::events::{EventBus, EventSink, RegistryEvent, RegistryEventKind};
use crate::store::{FarmerStore, InMemoryStore};
use crate::types::{ContributionRecord, Farmer, FarmerInfo, Identity, RegistrySummary};

/// Registry of farmers and their accumulated carbon reduction.
#[derive(Debug)]
pub struct FarmerRegistry<S: FarmerStore = InMemoryStore> {
    config: RegistryConfig,
    store: S,
    events: EventBus,
}

impl FarmerRegistry<InMemoryStore> {
    /// In-memory registry with default configuration.
    pub fn new() -> Self {
        let config = RegistryConfig::default();
        let mut events = EventBus::new();
        if config.events.log_events {
            events.subscribe(Arc::new(crate::events::TracingSink));
        }
        Self::with_store(config, InMemoryStore::new(), events)
    }

    /// In-memory registry with sinks built from `config.events`.
    pub fn with_config(config: RegistryConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let events = EventBus::from_config(&config.events)?;
        Ok(Self::with_store(config, InMemoryStore::new(), events))
    }
}

impl Default for FarmerRegistry<InMemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FarmerStore> FarmerRegistry<S> {
    /// Assemble a registry over an existing store and event bus.
    pub fn with_store(config: RegistryConfig, store: S, events: EventBus) -> Self {
        info!(
            registry = %config.registry_id,
            farmers = store.len(),
            sinks = events.sink_count(),
            "Farmer registry ready"
        );
        Self {
            config,
            store,
            events,
        }
    }

    /// Attach another event sink.
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.events.subscribe(sink);
    }

    /// Receiver on the broadcast channel built by [`with_config`](FarmerRegistry::with_config).
    ///
    /// `None` when the event bus was assembled by hand.
    pub fn subscribe_events(&self) -> Option<broadcast::Receiver<RegistryEvent>> {
        self.events.subscribe_channel()
    }

    /// Active configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Borrow the backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tear down the registry and keep the store.
    pub fn into_store(self) -> S {
        self.store
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Onboard `caller` with a name and location.
    ///
    /// Fails with [`RegistryError::AlreadyRegistered`] if the caller already
    /// has a record and with [`RegistryError::InvalidInput`] for blank or
    /// oversized text. The stored text is exactly what was passed in.
    pub fn register_farmer(&mut self, caller: &Identity, name: &str, location: &str) -> Result<()> {
        self.check_registration(caller, name, location)
            .map_err(|e| self.rejected("register_farmer", caller, e))?;

        self.store
            .insert_farmer(Farmer::new(caller.clone(), name, location))?;

        self.events.emit(RegistryEventKind::FarmerRegistered {
            identity: caller.clone(),
            name: name.to_string(),
            location: location.to_string(),
        });

        debug!(
            registry = %self.config.registry_id,
            identity = %caller,
            farmers = self.store.len(),
            "Registration committed"
        );
        Ok(())
    }

    /// Add `amount` to the caller's total and return the new total.
    ///
    /// Negative amounts are [`RegistryError::InvalidInput`]; a sum past
    /// `u64::MAX` is [`RegistryError::Overflow`]. Zero is accepted and
    /// recorded. Resubmitting a contribution counts it twice.
    pub fn record_carbon_reduction(&mut self, caller: &Identity, amount: i64) -> Result<u64> {
        let (amount, running_total) = self
            .check_contribution(caller, amount)
            .map_err(|e| self.rejected("record_carbon_reduction", caller, e))?;

        let record = ContributionRecord {
            sequence: self.store.ledger_len(),
            identity: caller.clone(),
            amount,
            running_total,
            recorded_at: chrono::Utc::now(),
        };
        let sequence = record.sequence;
        self.store.append_contribution(record)?;

        self.events.emit(RegistryEventKind::CarbonReductionRecorded {
            identity: caller.clone(),
            amount,
            total: running_total,
            sequence,
        });

        debug!(
            registry = %self.config.registry_id,
            identity = %caller,
            amount = amount,
            total = running_total,
            sequence = sequence,
            "Contribution committed"
        );
        Ok(running_total)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// `(name, location, total)` for a registered farmer.
    pub fn get_farmer_info(&self, identity: &Identity) -> Result<FarmerInfo> {
        self.lookup(identity).map(Farmer::info)
    }

    /// Full record including bookkeeping timestamps.
    pub fn farmer(&self, identity: &Identity) -> Result<Farmer> {
        self.lookup(identity).cloned()
    }

    /// Whether `identity` has a record.
    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.store.contains(identity)
    }

    /// Number of registered farmers.
    pub fn farmer_count(&self) -> usize {
        self.store.len()
    }

    /// All farmers ordered by identity.
    pub fn farmers(&self) -> Vec<Farmer> {
        self.store.farmers()
    }

    /// Contribution history for one farmer, oldest first.
    pub fn contributions(&self, identity: &Identity) -> Result<Vec<ContributionRecord>> {
        self.lookup(identity)?;
        Ok(self.store.contributions_for(identity))
    }

    /// Number of ledger lines across all farmers.
    pub fn ledger_len(&self) -> u64 {
        self.store.ledger_len()
    }

    /// Sum of every farmer's total.
    pub fn total_carbon_reduction(&self) -> u128 {
        self.store
            .farmers()
            .iter()
            .map(|f| f.total_carbon_reduction as u128)
            .sum()
    }

    /// Aggregate figures for the whole registry.
    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            farmer_count: self.store.len(),
            contribution_count: self.store.ledger_len(),
            total_carbon_reduction: self.total_carbon_reduction(),
        }
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    fn lookup(&self, identity: &Identity) -> Result<&Farmer> {
        self.store
            .get(identity)
            .ok_or_else(|| RegistryError::NotRegistered(identity.clone()))
    }

    fn check_registration(&self, caller: &Identity, name: &str, location: &str) -> Result<()> {
        check_identity(caller)?;
        if self.store.contains(caller) {
            return Err(RegistryError::AlreadyRegistered(caller.clone()));
        }
        check_fields(name, location, &self.config.limits)
    }

    /// Returns the accepted amount and the total it produces.
    fn check_contribution(&self, caller: &Identity, amount: i64) -> Result<(u64, u64)> {
        check_identity(caller)?;
        let amount = u64::try_from(amount).map_err(|_| {
            RegistryError::InvalidInput(format!("amount must not be negative, got {amount}"))
        })?;

        let current = self.lookup(caller)?.total_carbon_reduction;
        let total = current.checked_add(amount).ok_or_else(|| RegistryError::Overflow {
            identity: caller.clone(),
            current,
            amount,
        })?;

        Ok((amount, total))
    }

    fn rejected(&self, op: &'static str, caller: &Identity, err: RegistryError) -> RegistryError {
        warn!(
            registry = %self.config.registry_id,
            op = op,
            identity = %caller,
            error = %err,
            "Registry call rejected"
        );
        err
    }
}

/// Field checks shared by registration and snapshot restore.
pub(crate) fn check_farmer(farmer: &Farmer, limits: &LimitsConfig) -> Result<()> {
    check_identity(&farmer.identity)?;
    check_fields(&farmer.name, &farmer.location, limits)
}

fn check_identity(identity: &Identity) -> Result<()> {
    if identity.is_empty() {
        return Err(RegistryError::InvalidInput("identity must not be empty".to_string()));
    }
    Ok(())
}

fn check_fields(name: &str, location: &str, limits: &LimitsConfig) -> Result<()> {
    check_text("name", name, limits.max_name_len)?;
    check_text("location", location, limits.max_location_len)
}

fn check_text(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::InvalidInput(format!("{field} must not be empty")));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(RegistryError::InvalidInput(format!(
            "{field} is {len} characters, limit is {max_len}"
        )));
    }
    Ok(())
}
