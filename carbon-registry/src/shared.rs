//! Async handle for sharing one registry between tasks.
//!
//! Each write holds the lock for the whole call, so concurrent callers see
//! the same serialized, all-or-nothing commits a single-writer ledger gives.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::error::Result;
use crate::events::{EventSink, RegistryEvent};
use crate::registry::FarmerRegistry;
use crate::snapshot::{RegistrySnapshot, SnapshotError};
use crate::store::{FarmerStore, InMemoryStore};
use crate::types::{ContributionRecord, Farmer, FarmerInfo, Identity, RegistrySummary};

/// Clonable, task-safe registry handle.
pub struct SharedRegistry<S: FarmerStore = InMemoryStore> {
    inner: Arc<RwLock<FarmerRegistry<S>>>,
}

impl<S: FarmerStore> Clone for SharedRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: FarmerStore> SharedRegistry<S> {
    /// Take ownership of a registry.
    pub fn new(registry: FarmerRegistry<S>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }

    /// See [`FarmerRegistry::register_farmer`].
    pub async fn register_farmer(&self, caller: &Identity, name: &str, location: &str) -> Result<()> {
        let mut registry = self.inner.write().await;
        registry.register_farmer(caller, name, location)
    }

    /// See [`FarmerRegistry::record_carbon_reduction`].
    pub async fn record_carbon_reduction(&self, caller: &Identity, amount: i64) -> Result<u64> {
        let mut registry = self.inner.write().await;
        registry.record_carbon_reduction(caller, amount)
    }

    /// See [`FarmerRegistry::get_farmer_info`].
    pub async fn get_farmer_info(&self, identity: &Identity) -> Result<FarmerInfo> {
        let registry = self.inner.read().await;
        registry.get_farmer_info(identity)
    }

    /// Full record for one farmer.
    pub async fn farmer(&self, identity: &Identity) -> Result<Farmer> {
        self.inner.read().await.farmer(identity)
    }

    /// Whether `identity` has a record.
    pub async fn is_registered(&self, identity: &Identity) -> bool {
        self.inner.read().await.is_registered(identity)
    }

    /// Number of registered farmers.
    pub async fn farmer_count(&self) -> usize {
        self.inner.read().await.farmer_count()
    }

    /// All farmers ordered by identity.
    pub async fn farmers(&self) -> Vec<Farmer> {
        self.inner.read().await.farmers()
    }

    /// Contribution history for one farmer, oldest first.
    pub async fn contributions(&self, identity: &Identity) -> Result<Vec<ContributionRecord>> {
        self.inner.read().await.contributions(identity)
    }

    /// Number of ledger lines across all farmers.
    pub async fn ledger_len(&self) -> u64 {
        self.inner.read().await.ledger_len()
    }

    /// Sum of every farmer's total.
    pub async fn total_carbon_reduction(&self) -> u128 {
        self.inner.read().await.total_carbon_reduction()
    }

    /// Aggregate figures, read under one lock.
    pub async fn summary(&self) -> RegistrySummary {
        self.inner.read().await.summary()
    }

    /// Attach an event sink.
    pub async fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.inner.write().await.subscribe(sink);
    }

    /// See [`FarmerRegistry::subscribe_events`].
    pub async fn subscribe_events(&self) -> Option<broadcast::Receiver<RegistryEvent>> {
        self.inner.read().await.subscribe_events()
    }

    /// Export a consistent snapshot.
    pub async fn snapshot(&self) -> std::result::Result<RegistrySnapshot, SnapshotError> {
        self.inner.read().await.snapshot()
    }
}

impl<S: FarmerStore> From<FarmerRegistry<S>> for SharedRegistry<S> {
    fn from(registry: FarmerRegistry<S>) -> Self {
        Self::new(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;

    #[tokio::test]
    async fn test_concurrent_contributions_sum_exactly() {
        let shared = SharedRegistry::new(FarmerRegistry::new());
        let a0 = Identity::new("account-0");
        shared.register_farmer(&a0, "John Doe", "Farmville").await.unwrap();

        let mut handles = Vec::new();
        for i in 1..=50i64 {
            let shared = shared.clone();
            let a0 = a0.clone();
            handles.push(tokio::spawn(async move {
                shared.record_carbon_reduction(&a0, i).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let info = shared.get_farmer_info(&a0).await.unwrap();
        assert_eq!(info.total_carbon_reduction, (1..=50).sum::<i64>() as u64);

        let history = shared.contributions(&a0).await.unwrap();
        assert_eq!(history.len(), 50);
        assert!(history
            .windows(2)
            .all(|w| w[0].running_total <= w[1].running_total));
    }

    #[test]
    fn test_reads_see_committed_writes() {
        let shared = SharedRegistry::from(FarmerRegistry::new());
        let a0 = Identity::new("account-0");

        tokio_test::block_on(async {
            assert!(!shared.is_registered(&a0).await);
            assert_eq!(shared.farmer_count().await, 0);
            shared.register_farmer(&a0, "John Doe", "Farmville").await.unwrap();
            shared.record_carbon_reduction(&a0, 50).await.unwrap();
            shared.record_carbon_reduction(&a0, 7).await.unwrap();

            let farmer = shared.farmer(&a0).await.unwrap();
            assert_eq!(farmer.total_carbon_reduction, 57);
            assert_eq!(shared.farmers().await.len(), 1);
            assert_eq!(shared.farmer_count().await, 1);
            assert_eq!(shared.ledger_len().await, 2);
            assert_eq!(shared.total_carbon_reduction().await, 57);
        });
    }

    #[tokio::test]
    async fn test_concurrent_registration_is_exactly_once() {
        let shared = SharedRegistry::new(FarmerRegistry::new());
        let a0 = Identity::new("account-0");

        let mut handles = Vec::new();
        for i in 0..10 {
            let shared = shared.clone();
            let a0 = a0.clone();
            handles.push(tokio::spawn(async move {
                shared
                    .register_farmer(&a0, &format!("Farmer {i}"), "Farmville")
                    .await
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(RegistryError::AlreadyRegistered(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(shared.summary().await.farmer_count, 1);
    }
}
