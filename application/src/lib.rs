//! Application layer for blockhand
//!
//! This crate contains use cases, port definitions, and application configuration.
//! It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{AgentConfig, BehaviorParams, DelegationParams, SessionParams, WatchdogParams};
pub use ports::{
    activity_logger::{ActivityEvent, ActivityLogger, NoActivityLogger},
    ledger::{LedgerError, LedgerPort, LogLevel, TaskSubmission},
    world::{BlockPredicate, Control, Goal, WorldError, WorldEvent, WorldPort},
};
pub use use_cases::behaviors::{
    AgentStateView, BehaviorExecutor, BehaviorOutcome, BuildReport,
};
pub use use_cases::capabilities::{
    ActionProvider, DelegationReceipt, DeliverReport, HarvestReport, ResourceDelegator,
};
pub use use_cases::delegation::DelegationClient;
pub use use_cases::dispatcher::{CommandDispatcher, DispatchOutcome, DispatchWorker};
pub use use_cases::periodic::PeriodicTask;
pub use use_cases::register_agent::{Registration, RegisterAgentUseCase};
pub use use_cases::session::AgentSession;
pub use use_cases::step_protocol::{StepOutcome, StepProtocol};
pub use use_cases::watchdog::{StallDetector, StallWatchdog};
