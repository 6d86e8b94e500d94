//! Hash-sealed registry snapshots.
//!
//! A snapshot captures every farmer and the full contribution ledger. On
//! restore the ledger is replayed into an empty store, so a snapshot whose
//! totals disagree with its ledger is refused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

use crate::config::RegistryConfig;
use crate::events::EventBus;
use crate::registry::{check_farmer, FarmerRegistry};
use crate::store::FarmerStore;
use crate::types::{ContributionRecord, Farmer};

/// Current on-disk format.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Error types for snapshot operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Unsupported snapshot format version: {0}")]
    UnsupportedVersion(u32),

    /// Content does not match the sealed hash
    #[error("Snapshot hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    /// Content is internally inconsistent
    #[error("Snapshot invariant violated: {0}")]
    Invariant(String),
}

/// Exported registry state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub format_version: u32,
    pub taken_at: DateTime<Utc>,
    pub farmers: Vec<Farmer>,
    pub contributions: Vec<ContributionRecord>,
    /// Hex SHA256 over `farmers` and `contributions`
    pub content_hash: String,
}

impl RegistrySnapshot {
    /// Seal the given state.
    pub fn new(
        farmers: Vec<Farmer>,
        contributions: Vec<ContributionRecord>,
    ) -> Result<Self, SnapshotError> {
        let content_hash = content_hash(&farmers, &contributions)?;
        Ok(Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            taken_at: Utc::now(),
            farmers,
            contributions,
            content_hash,
        })
    }

    /// Check the version and recompute the hash.
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.format_version));
        }
        let actual = content_hash(&self.farmers, &self.contributions)?;
        if actual != self.content_hash {
            return Err(SnapshotError::HashMismatch {
                expected: self.content_hash.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Write as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!(
            path = %path.as_ref().display(),
            farmers = self.farmers.len(),
            contributions = self.contributions.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save). Does not verify.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Compute SHA256 hash of snapshot content.
fn content_hash(
    farmers: &[Farmer],
    contributions: &[ContributionRecord],
) -> Result<String, SnapshotError> {
    let json = serde_json::to_vec(&(farmers, contributions))?;
    let mut hasher = Sha256::new();
    hasher.update(&json);
    Ok(hex::encode(hasher.finalize()))
}

impl<S: FarmerStore> FarmerRegistry<S> {
    /// Export the current state.
    pub fn snapshot(&self) -> Result<RegistrySnapshot, SnapshotError> {
        RegistrySnapshot::new(self.store().farmers(), self.store().ledger())
    }

    /// Rebuild a registry from a snapshot into an empty store.
    ///
    /// Farmers are inserted with zero totals and the ledger is replayed, so
    /// every total must equal the sum of its contributions and every running
    /// total must follow from the one before. Identities and text fields are
    /// held to the same rules and `config.limits` as registration. No events
    /// are emitted.
    pub fn restore(
        config: RegistryConfig,
        mut store: S,
        events: EventBus,
        snapshot: &RegistrySnapshot,
    ) -> Result<Self, SnapshotError> {
        snapshot.verify()?;
        if !store.is_empty() || store.ledger_len() != 0 {
            return Err(SnapshotError::Invariant("target store is not empty".to_string()));
        }

        for farmer in &snapshot.farmers {
            check_farmer(farmer, &config.limits).map_err(|e| {
                SnapshotError::Invariant(format!("farmer {:?}: {e}", farmer.identity.as_str()))
            })?;
            let fresh = Farmer {
                total_carbon_reduction: 0,
                contribution_count: 0,
                last_contribution_at: None,
                ..farmer.clone()
            };
            store
                .insert_farmer(fresh)
                .map_err(|e| SnapshotError::Invariant(e.to_string()))?;
        }

        for record in &snapshot.contributions {
            let previous = store
                .get(&record.identity)
                .map(|f| f.total_carbon_reduction)
                .ok_or_else(|| {
                    SnapshotError::Invariant(format!(
                        "contribution {} references unknown farmer {}",
                        record.sequence, record.identity
                    ))
                })?;
            if previous.checked_add(record.amount) != Some(record.running_total) {
                return Err(SnapshotError::Invariant(format!(
                    "contribution {} running total {} does not follow {} + {}",
                    record.sequence, record.running_total, previous, record.amount
                )));
            }
            store
                .append_contribution(record.clone())
                .map_err(|e| SnapshotError::Invariant(e.to_string()))?;
        }

        let mut expected = snapshot.farmers.clone();
        expected.sort_by(|a, b| a.identity.cmp(&b.identity));
        if store.farmers() != expected {
            return Err(SnapshotError::Invariant(
                "farmer records disagree with the contribution ledger".to_string(),
            ));
        }

        info!(
            farmers = store.len(),
            contributions = store.ledger_len(),
            "Registry restored from snapshot"
        );
        Ok(Self::with_store(config, store, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::Identity;

    fn populated() -> FarmerRegistry {
        let mut registry = FarmerRegistry::new();
        let a = Identity::new("a");
        let b = Identity::new("b");
        registry.register_farmer(&a, "Ann", "North").unwrap();
        registry.register_farmer(&b, "Bo", "South").unwrap();
        registry.record_carbon_reduction(&a, 50).unwrap();
        registry.record_carbon_reduction(&b, 10).unwrap();
        registry.record_carbon_reduction(&a, 25).unwrap();
        registry
    }

    fn restore(snapshot: &RegistrySnapshot) -> Result<FarmerRegistry, SnapshotError> {
        FarmerRegistry::restore(
            RegistryConfig::default(),
            InMemoryStore::new(),
            EventBus::new(),
            snapshot,
        )
    }

    #[test]
    fn test_restore_reproduces_state() {
        let original = populated();
        let snapshot = original.snapshot().unwrap();
        snapshot.verify().unwrap();

        let restored = restore(&snapshot).unwrap();
        assert_eq!(restored.farmers(), original.farmers());
        assert_eq!(restored.summary(), original.summary());
        assert_eq!(
            restored.contributions(&"a".into()).unwrap(),
            original.contributions(&"a".into()).unwrap()
        );
    }

    #[test]
    fn test_restored_registry_keeps_sequence() {
        let snapshot = populated().snapshot().unwrap();
        let mut restored = restore(&snapshot).unwrap();

        assert_eq!(restored.record_carbon_reduction(&"b".into(), 5).unwrap(), 15);
        let history = restored.contributions(&"b".into()).unwrap();
        assert_eq!(history.last().unwrap().sequence, 3);
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let mut snapshot = populated().snapshot().unwrap();
        snapshot.farmers[0].total_carbon_reduction += 1;

        assert!(matches!(
            restore(&snapshot),
            Err(SnapshotError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_inconsistent_snapshot_rejected() {
        let registry = populated();
        let mut farmers = registry.farmers();
        farmers[0].total_carbon_reduction = 999;
        let snapshot = RegistrySnapshot::new(farmers, registry.store().ledger()).unwrap();

        assert!(matches!(restore(&snapshot), Err(SnapshotError::Invariant(_))));
    }

    #[test]
    fn test_decreasing_running_total_rejected() {
        let registry = populated();
        let mut ledger = registry.store().ledger();
        ledger[2].running_total = 10;
        let snapshot = RegistrySnapshot::new(registry.farmers(), ledger).unwrap();

        assert!(matches!(restore(&snapshot), Err(SnapshotError::Invariant(_))));
    }

    #[test]
    fn test_invalid_farmer_fields_rejected() {
        let blank = RegistrySnapshot::new(vec![Farmer::new("".into(), "   ", "")], vec![]).unwrap();
        assert!(matches!(restore(&blank), Err(SnapshotError::Invariant(_))));

        let oversized =
            RegistrySnapshot::new(vec![Farmer::new("b".into(), "x".repeat(10_000), "North")], vec![])
                .unwrap();
        assert!(matches!(restore(&oversized), Err(SnapshotError::Invariant(_))));

        // Limits come from the restoring config.
        let mut config = RegistryConfig::default();
        config.limits.max_name_len = 2;
        let snapshot = populated().snapshot().unwrap();
        let err = FarmerRegistry::restore(config, InMemoryStore::new(), EventBus::new(), &snapshot)
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Invariant(_)));
    }

    #[test]
    fn test_unsupported_version() {
        let mut snapshot = populated().snapshot().unwrap();
        snapshot.format_version = 99;
        assert!(matches!(
            snapshot.verify(),
            Err(SnapshotError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let snapshot = populated().snapshot().unwrap();
        snapshot.save(&path).unwrap();

        let loaded = RegistrySnapshot::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(restore(&loaded).unwrap().farmer_count(), 2);
    }
}
