//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod activity_logger;
pub mod ledger;
pub mod world;
