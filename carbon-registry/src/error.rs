//! Error types for registry operations.

use crate::store::StoreError;
use crate::types::Identity;

/// Failures surfaced by [`FarmerRegistry`](crate::FarmerRegistry).
///
/// Every variant is raised before any state is written, so a failed call
/// leaves the registry exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Malformed arguments (empty text, negative amount, oversized text)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Identity already has a farmer record
    #[error("Farmer already registered: {0}")]
    AlreadyRegistered(Identity),

    /// Identity has no farmer record
    #[error("Farmer not registered: {0}")]
    NotRegistered(Identity),

    /// Total would exceed the representable range
    #[error("Carbon reduction overflow for {identity}: {current} + {amount}")]
    Overflow {
        identity: Identity,
        current: u64,
        amount: u64,
    },

    /// Backing store rejected the write
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
