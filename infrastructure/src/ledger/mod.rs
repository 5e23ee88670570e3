//! Ledger adapters.
//!
//! [`LocalLedger`] is an in-process credit ledger shared by every simulated
//! agent; each agent talks to it through its own [`LedgerAccount`], which
//! implements the [`LedgerPort`](blockhand_application::LedgerPort).

mod local;

pub use local::{LedgerAccount, LocalLedger};
