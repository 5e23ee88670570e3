//! Ledger port
//!
//! Defines the interface to the credit ledger that meters task submission
//! and carries the step protocol between requester and provider.

use async_trait::async_trait;
use blockhand_domain::{
    AgentError, AgentId, CreditBalance, PlanId, Step, StepEvent, StepId, TaskId, TaskUpdate,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown {kind}: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Insufficient balance on plan {0}")]
    InsufficientBalance(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Ledger connection closed")]
    TransportClosed,
}

impl From<LedgerError> for AgentError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance(plan_id) => AgentError::InsufficientCredit { plan_id },
            other => AgentError::Ledger(other.to_string()),
        }
    }
}

/// Severity of an entry in a task's log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        })
    }
}

/// Result of submitting a task: its id and the stream of status updates.
#[derive(Debug)]
pub struct TaskSubmission {
    pub task_id: TaskId,
    pub updates: mpsc::UnboundedReceiver<TaskUpdate>,
}

/// Gateway to the credit ledger.
///
/// The requester side uses balances, ordering and submission; the
/// provider side subscribes to step events and drives steps.
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Create a credits plan that gates access to this agent.
    async fn create_credits_plan(&self, name: &str, credits: u64) -> Result<PlanId, LedgerError>;

    /// Register this agent under a plan.
    async fn create_agent(&self, name: &str, plan_id: &PlanId) -> Result<AgentId, LedgerError>;

    async fn get_balance(&self, plan_id: &PlanId) -> Result<CreditBalance, LedgerError>;

    /// Purchase a subscription to a plan.
    async fn order_plan(&self, plan_id: &PlanId) -> Result<(), LedgerError>;

    /// Submit a query to another agent.
    async fn submit_task(
        &self,
        agent_id: &AgentId,
        plan_id: &PlanId,
        query: &str,
    ) -> Result<TaskSubmission, LedgerError>;

    /// Receive step events for tasks addressed to `agent_id`.
    async fn subscribe_steps(
        &self,
        agent_id: &AgentId,
    ) -> Result<mpsc::UnboundedReceiver<StepEvent>, LedgerError>;

    async fn get_step(&self, step_id: &StepId) -> Result<Step, LedgerError>;

    /// Register new steps for a task. Each one produces a step event.
    async fn create_steps(&self, task_id: &TaskId, steps: Vec<Step>) -> Result<(), LedgerError>;

    async fn update_step(&self, step: &Step) -> Result<(), LedgerError>;

    /// Append an entry to the task's log stream.
    async fn log_task(
        &self,
        task_id: &TaskId,
        level: LogLevel,
        message: &str,
    ) -> Result<(), LedgerError>;
}
