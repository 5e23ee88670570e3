//! Console chat bridge
//!
//! Stands in for an in-game chat window: plain lines are spoken by the
//! configured player, slash commands inspect or disturb the world.

mod input;
mod repl;

pub use input::ConsoleInput;
pub use repl::{AgentStatus, ConsoleBackend, ConsoleRepl, Reply};
