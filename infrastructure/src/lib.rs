//! Infrastructure layer for blockhand
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the simulated world, the local credit ledger,
//! the collaborator registry file, activity logging and configuration
//! file loading.

pub mod config;
pub mod ledger;
pub mod logging;
pub mod registry;
pub mod world;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use ledger::{LedgerAccount, LocalLedger};
pub use logging::JsonlActivityLogger;
pub use registry::{JsonFileCollaboratorRegistry, RegistryError};
pub use world::{ChatLine, SimulatedAgent, SimulatedWorld, SimulationSettings};
