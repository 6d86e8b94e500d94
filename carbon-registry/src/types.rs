//! Core types for the farmer registry.
//!
//! A [`Farmer`] is created once per [`Identity`] and only ever grows its
//! carbon reduction total. Every accepted contribution is kept as a
//! [`ContributionRecord`] in the append-only ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque participant key supplied by the execution environment.
///
/// The registry never generates identities; it only indexes by them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an externally supplied account reference.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the key is empty or only whitespace.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farmer {
    /// Key the record is stored under
    pub identity: Identity,
    /// Display name, fixed at registration
    pub name: String,
    /// Farm location, fixed at registration
    pub location: String,
    /// Accumulated carbon reduction
    pub total_carbon_reduction: u64,
    /// When the farmer was registered
    pub registered_at: DateTime<Utc>,
    /// Number of accepted contributions
    pub contribution_count: u64,
    /// When the latest contribution was accepted
    pub last_contribution_at: Option<DateTime<Utc>>,
}

impl Farmer {
    /// Create a freshly registered farmer with a zero total.
    pub fn new(identity: Identity, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            identity,
            name: name.into(),
            location: location.into(),
            total_carbon_reduction: 0,
            registered_at: Utc::now(),
            contribution_count: 0,
            last_contribution_at: None,
        }
    }

    /// Read view returned by `get_farmer_info`.
    pub fn info(&self) -> FarmerInfo {
        FarmerInfo {
            name: self.name.clone(),
            location: self.location.clone(),
            total_carbon_reduction: self.total_carbon_reduction,
        }
    }
}

/// The public `(name, location, total)` view of a farmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmerInfo {
    pub name: String,
    pub location: String,
    pub total_carbon_reduction: u64,
}

impl From<&Farmer> for FarmerInfo {
    fn from(farmer: &Farmer) -> Self {
        farmer.info()
    }
}

impl From<FarmerInfo> for (String, String, u64) {
    fn from(info: FarmerInfo) -> Self {
        (info.name, info.location, info.total_carbon_reduction)
    }
}

/// One line of the append-only contribution ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    /// Position in the ledger, starting at 0 with no gaps
    pub sequence: u64,
    /// Farmer the contribution was credited to
    pub identity: Identity,
    /// Amount added
    pub amount: u64,
    /// Farmer's total after applying this contribution
    pub running_total: u64,
    /// When the contribution was accepted
    pub recorded_at: DateTime<Utc>,
}

/// Registry-wide aggregate figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrySummary {
    pub farmer_count: usize,
    pub contribution_count: u64,
    /// Sum across all farmers; wider than a single total so it cannot overflow
    pub total_carbon_reduction: u128,
}
