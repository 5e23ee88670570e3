//! Delegated task entity and its status machine.

use super::value_objects::{AgentId, PlanId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a delegated task.
///
/// Progresses monotonically: `Submitted → InProgress* → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Submitted => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Submitted => "Submitted",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
            TaskStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status update pushed by the ledger for a submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: TaskId,
    pub task_status: TaskStatus,
    #[serde(default)]
    pub output: Option<String>,
}

impl TaskUpdate {
    pub fn new(task_id: TaskId, task_status: TaskStatus) -> Self {
        Self {
            task_id,
            task_status,
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// A task this agent submitted to a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub plan_id: PlanId,
    pub query: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn submitted(
        task_id: TaskId,
        agent_id: AgentId,
        plan_id: PlanId,
        query: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            agent_id,
            plan_id,
            query: query.into(),
            status: TaskStatus::Submitted,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply an observed status.
    ///
    /// Returns `true` when the status actually changed. Repeated or
    /// regressing updates are ignored, and once terminal the task never
    /// changes again.
    pub fn advance(&mut self, status: TaskStatus) -> bool {
        if self.status.is_terminal()
            || status.rank() < self.status.rank()
            || status == self.status
        {
            return false;
        }
        self.status = status;
        true
    }
}
