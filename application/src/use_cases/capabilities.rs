//! Narrow capabilities passed between use cases.
//!
//! The step protocol only needs to trigger a harvest and a delivery, and
//! the Build behavior only needs a way to obtain missing resources. These
//! traits keep those edges small so neither side depends on the other's
//! concrete type.

use async_trait::async_trait;
use blockhand_domain::{AgentError, TaskId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Result of a completed harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Units requested.
    pub requested: u32,
    /// Units collected during this run.
    pub collected: u32,
    /// Units held when the harvest ended.
    pub held: u32,
}

impl HarvestReport {
    /// Whether the inventory already covered the request.
    pub fn was_already_satisfied(&self) -> bool {
        self.collected == 0 && self.held >= self.requested
    }
}

/// Result of a completed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverReport {
    pub requester: String,
    pub thrown: u32,
}

/// Work an agent can perform on behalf of a delegated task.
#[async_trait]
pub trait ActionProvider: Send + Sync {
    /// Gather until at least `amount` units are held.
    async fn harvest(&self, amount: u32) -> Result<HarvestReport, AgentError>;

    /// Walk to `requester` and throw every held unit to them.
    async fn deliver(&self, requester: &str) -> Result<DeliverReport, AgentError>;
}

/// Outcome of a successful resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationReceipt {
    pub task_id: TaskId,
    pub collaborator: String,
    /// Units picked up from the ground after the handoff.
    pub received: u32,
}

/// Obtains missing resources from another agent.
#[async_trait]
pub trait ResourceDelegator: Send + Sync {
    /// Request `amount` units of `resource` and wait for the handoff.
    ///
    /// Returns once the items were picked up, the task failed, the handoff
    /// timed out or `cancel` fired.
    async fn request_resources(
        &self,
        resource: &str,
        amount: u32,
        cancel: &CancellationToken,
    ) -> Result<DelegationReceipt, AgentError>;
}
