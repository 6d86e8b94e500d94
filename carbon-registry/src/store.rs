//! Storage for farmer records and the contribution ledger.
//!
//! The registry talks to storage only through [`FarmerStore`], so the same
//! state machine can sit on top of an in-memory map in tests or on whatever
//! state backend the execution environment provides.

use std::collections::{BTreeMap, HashMap};

use crate::types::{ContributionRecord, Farmer, Identity};

/// Error types for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Insert attempted over an existing record
    #[error("Duplicate record: {0}")]
    Duplicate(Identity),

    /// Update attempted on a missing record
    #[error("Record not found: {0}")]
    NotFound(Identity),

    /// Ledger line out of order
    #[error("Ledger sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u64, actual: u64 },
}

/// Storage seam for the registry.
///
/// Implementations must apply each write method as a single step: either the
/// whole change is visible afterwards or none of it is.
pub trait FarmerStore: Send + Sync {
    /// Look up a farmer record.
    fn get(&self, identity: &Identity) -> Option<&Farmer>;

    /// Whether a record exists for the identity.
    fn contains(&self, identity: &Identity) -> bool {
        self.get(identity).is_some()
    }

    /// Insert a new record. Fails if one already exists.
    fn insert_farmer(&mut self, farmer: Farmer) -> Result<(), StoreError>;

    /// Append a ledger line and move the farmer's total to its
    /// `running_total`.
    fn append_contribution(&mut self, record: ContributionRecord) -> Result<(), StoreError>;

    /// Ledger lines for one farmer, oldest first.
    fn contributions_for(&self, identity: &Identity) -> Vec<ContributionRecord>;

    /// All farmers ordered by identity.
    fn farmers(&self) -> Vec<Farmer>;

    /// The full ledger, oldest first.
    fn ledger(&self) -> Vec<ContributionRecord>;

    /// Number of farmer records.
    fn len(&self) -> usize;

    /// True when no farmer is registered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of ledger lines.
    fn ledger_len(&self) -> u64;
}

/// In-memory store backed by ordered maps.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    /// Farmer records by identity
    farmers: BTreeMap<Identity, Farmer>,
    /// Append-only ledger
    ledger: Vec<ContributionRecord>,
    /// Ledger positions per identity
    by_identity: HashMap<Identity, Vec<usize>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FarmerStore for InMemoryStore {
    fn get(&self, identity: &Identity) -> Option<&Farmer> {
        self.farmers.get(identity)
    }

    fn insert_farmer(&mut self, farmer: Farmer) -> Result<(), StoreError> {
        if self.farmers.contains_key(&farmer.identity) {
            return Err(StoreError::Duplicate(farmer.identity));
        }
        self.farmers.insert(farmer.identity.clone(), farmer);
        Ok(())
    }

    fn append_contribution(&mut self, record: ContributionRecord) -> Result<(), StoreError> {
        let expected = self.ledger.len() as u64;
        if record.sequence != expected {
            return Err(StoreError::SequenceMismatch {
                expected,
                actual: record.sequence,
            });
        }

        let farmer = self
            .farmers
            .get_mut(&record.identity)
            .ok_or_else(|| StoreError::NotFound(record.identity.clone()))?;

        farmer.total_carbon_reduction = record.running_total;
        farmer.contribution_count += 1;
        farmer.last_contribution_at = Some(record.recorded_at);

        self.by_identity
            .entry(record.identity.clone())
            .or_default()
            .push(self.ledger.len());
        self.ledger.push(record);

        Ok(())
    }

    fn contributions_for(&self, identity: &Identity) -> Vec<ContributionRecord> {
        self.by_identity
            .get(identity)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&i| self.ledger.get(i).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn farmers(&self) -> Vec<Farmer> {
        self.farmers.values().cloned().collect()
    }

    fn ledger(&self) -> Vec<ContributionRecord> {
        self.ledger.clone()
    }

    fn len(&self) -> usize {
        self.farmers.len()
    }

    fn ledger_len(&self) -> u64 {
        self.ledger.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(sequence: u64, id: &str, amount: u64, running_total: u64) -> ContributionRecord {
        ContributionRecord {
            sequence,
            identity: Identity::new(id),
            amount,
            running_total,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut store = InMemoryStore::new();
        store
            .insert_farmer(Farmer::new("a".into(), "Ann", "North"))
            .unwrap();

        let err = store
            .insert_farmer(Farmer::new("a".into(), "Other", "South"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
        assert_eq!(store.get(&"a".into()).unwrap().name, "Ann");
    }

    #[test]
    fn test_append_updates_farmer_and_index() {
        let mut store = InMemoryStore::new();
        store.insert_farmer(Farmer::new("a".into(), "Ann", "North")).unwrap();
        store.insert_farmer(Farmer::new("b".into(), "Bo", "South")).unwrap();

        store.append_contribution(record(0, "a", 10, 10)).unwrap();
        store.append_contribution(record(1, "b", 5, 5)).unwrap();
        store.append_contribution(record(2, "a", 7, 17)).unwrap();

        let ann = store.get(&"a".into()).unwrap();
        assert_eq!(ann.total_carbon_reduction, 17);
        assert_eq!(ann.contribution_count, 2);
        assert!(ann.last_contribution_at.is_some());

        let history = store.contributions_for(&"a".into());
        assert_eq!(history.iter().map(|r| r.sequence).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(store.ledger_len(), 3);
    }

    #[test]
    fn test_append_rejects_gaps_and_unknown_farmers() {
        let mut store = InMemoryStore::new();
        store.insert_farmer(Farmer::new("a".into(), "Ann", "North")).unwrap();

        let err = store.append_contribution(record(3, "a", 1, 1)).unwrap_err();
        assert!(matches!(err, StoreError::SequenceMismatch { expected: 0, actual: 3 }));

        let err = store.append_contribution(record(0, "ghost", 1, 1)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.ledger_len(), 0);
    }
}
