//! Presentation layer for blockhand
//!
//! This crate contains the CLI definition, the console chat bridge and
//! console output formatting.

pub mod cli;
pub mod console;
pub mod output;

// Re-export commonly used types
pub use cli::commands::Cli;
pub use console::{AgentStatus, ConsoleBackend, ConsoleInput, ConsoleRepl, Reply};
pub use output::console::ConsoleFormatter;
