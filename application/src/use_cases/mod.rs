//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod behaviors;
pub mod capabilities;
pub mod delegation;
pub mod dispatcher;
pub mod narration;
pub mod periodic;
pub mod register_agent;
pub mod session;
pub mod step_protocol;
pub mod watchdog;
