//! Carbon Footprint Tracking Registry
//!
//! An append-only ledger of farmers and the carbon reduction each one has
//! contributed:
//!
//! - **Registration**: each identity is onboarded exactly once with a name
//!   and location that never change afterwards
//! - **Accounting**: contributions only ever increase a farmer's total;
//!   negative amounts and overflow are refused
//! - **Events**: observers receive registration and contribution events
//!   after each committed change
//!
//! # Key Components
//!
//! - [`FarmerRegistry`]: the state machine, generic over its [`FarmerStore`]
//! - [`SharedRegistry`]: async handle serializing writers across tasks
//! - [`EventBus`]: observer list fed by the registry
//! - [`RegistrySnapshot`]: hash-sealed export of the full state
//!
//! # Example
//!
//! ```
//! use carbon_registry::{FarmerRegistry, Identity};
//!
//! let mut registry = FarmerRegistry::new();
//! let caller = Identity::new("account-0");
//!
//! registry.register_farmer(&caller, "John Doe", "Farmville")?;
//! registry.record_carbon_reduction(&caller, 50)?;
//!
//! let info = registry.get_farmer_info(&caller)?;
//! assert_eq!(info.total_carbon_reduction, 50);
//! # Ok::<(), carbon_registry::RegistryError>(())
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod shared;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export main types
pub use config::{ConfigError, RegistryConfig};
pub use error::{RegistryError, Result};
pub use events::{EventBus, EventSink, RegistryEvent, RegistryEventKind};
pub use registry::FarmerRegistry;
pub use shared::SharedRegistry;
pub use snapshot::{RegistrySnapshot, SnapshotError};
pub use store::{FarmerStore, InMemoryStore, StoreError};
pub use types::*;
