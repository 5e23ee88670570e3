//! Chat command domain.
//!
//! - [`grammar::Command`]: the typed command set
//! - [`grammar::strip_address`]: address-prefix recognition

pub mod grammar;
