//! Ledger domain: delegated tasks, protocol steps and credit balances.
//!
//! - [`value_objects`]: agent/plan/task/step identifiers, [`value_objects::CreditBalance`]
//! - [`task::Task`]: a task this agent submitted, with a monotonic status
//! - [`step::Step`]: a step of a task this agent serves as provider

pub mod step;
pub mod task;
pub mod value_objects;
