//! Task steps as seen by the provider side of the protocol.
//!
//! A task starts with a single [`INIT_STEP`]. The provider answers it by
//! synthesizing the successor chain, each link pointing back at the step
//! before it through `predecessor`.

use super::value_objects::{StepId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the step every task starts with.
pub const INIT_STEP: &str = "init";

/// Name of the work step that gathers resources for the requester.
pub const HARVEST_STEP: &str = "harvest";

/// Step lifecycle: `Pending → InProgress → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "Pending",
            StepStatus::InProgress => "InProgress",
            StepStatus::Completed => "Completed",
            StepStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Inbound notification that a step needs attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_id: StepId,
}

/// A step of a delegated task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step_id: StepId,
    pub task_id: TaskId,
    pub predecessor: Option<StepId>,
    pub name: String,
    pub status: StepStatus,
    pub input_query: String,
    pub output: Option<String>,
    pub cost: u64,
    pub is_last: bool,
}

impl Step {
    /// A fresh pending step.
    pub fn pending(
        step_id: StepId,
        task_id: TaskId,
        name: impl Into<String>,
        input_query: impl Into<String>,
    ) -> Self {
        Self {
            step_id,
            task_id,
            predecessor: None,
            name: name.into(),
            status: StepStatus::Pending,
            input_query: input_query.into(),
            output: None,
            cost: 0,
            is_last: false,
        }
    }

    pub fn with_predecessor(mut self, predecessor: StepId) -> Self {
        self.predecessor = Some(predecessor);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `InProgress`. Returns `false` if the step already finished.
    pub fn start(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = StepStatus::InProgress;
        true
    }

    /// Mark completed with an output and cost. Terminal states are sticky.
    pub fn complete(&mut self, output: impl Into<String>, cost: u64, is_last: bool) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = StepStatus::Completed;
        self.output = Some(output.into());
        self.cost = cost;
        self.is_last = is_last;
        true
    }

    /// Mark failed with a diagnostic output. Failed steps end the task.
    pub fn fail(&mut self, diagnostic: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = StepStatus::Failed;
        self.output = Some(diagnostic.into());
        self.is_last = true;
        true
    }

    /// Build the successor chain that follows this step.
    ///
    /// Each synthesized step carries the originating step's input and
    /// exactly one predecessor: the step before it in `names`, or `self`
    /// for the first. Ids are derived from the origin id and position so
    /// a chain can never loop back onto an earlier step.
    pub fn synthesize_successors(&self, names: &[&str]) -> Vec<Step> {
        let mut chain: Vec<Step> = Vec::with_capacity(names.len());
        let mut previous = self.step_id.clone();
        for (index, name) in names.iter().enumerate() {
            let step_id = StepId::new(format!("{}.{}-{}", self.step_id, index + 1, name));
            let step = Step::pending(
                step_id.clone(),
                self.task_id.clone(),
                *name,
                self.input_query.clone(),
            )
            .with_predecessor(previous);
            previous = step_id;
            chain.push(step);
        }
        if let Some(last) = chain.last_mut() {
            last.is_last = true;
        }
        chain
    }
}
