//! Domain layer for blockhand
//!
//! This crate contains the core entities, value objects and rules.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Behaviors
//!
//! An agent executes one long-running behavior at a time (harvesting,
//! building, following, delivering), tracked by [`AgentState`].
//!
//! ## Delegation
//!
//! When a behavior lacks resources, the agent buys work from a peer
//! ([`CollaboratorRecord`]) through the ledger: a [`Task`] is submitted and
//! the peer answers it as a chain of [`Step`]s.

pub mod collaborator;
pub mod command;
pub mod config;
pub mod core;
pub mod ledger;
pub mod world;

// Re-export commonly used types
pub use collaborator::{
    entities::{CollaboratorRecord, Role},
    repository::CollaboratorRepository,
};
pub use command::grammar::{ChatCommand, Command, CommandError, strip_address};
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use core::error::AgentError;
pub use ledger::{
    step::{HARVEST_STEP, INIT_STEP, Step, StepEvent, StepStatus},
    task::{Task, TaskStatus, TaskUpdate},
    value_objects::{AgentId, CreditBalance, PlanId, StepId, TaskId},
};
pub use world::{
    entities::{AgentState, BehaviorKind},
    inventory::{INVENTORY_SLOTS, Inventory, ItemStack, STACK_LIMIT},
    value_objects::{Block, BlockPos, DroppedItem, Face, Position, ResourceTag},
};
