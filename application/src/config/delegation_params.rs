//! Delegation parameters: requester and provider sides of the task protocol.

use super::behavior_params::DEFAULT_HANDOFF_TOKEN;
use blockhand_domain::Role;
use std::time::Duration;

/// Parameters for the Task Delegation Client and the Step Protocol.
#[derive(Debug, Clone)]
pub struct DelegationParams {
    /// Role a collaborator must advertise to receive resource requests.
    pub capability: Role,
    /// Chat token the collaborator sends once items are on the ground.
    pub handoff_token: String,
    /// Upper bound on the wait from submission to handoff.
    pub handoff_timeout: Duration,
    /// Radius searched for dropped items after a handoff.
    pub pickup_radius: f64,
    /// Credits charged for a completed work step.
    pub step_cost: u64,
}

impl Default for DelegationParams {
    fn default() -> Self {
        Self {
            capability: Role::Merchant,
            handoff_token: DEFAULT_HANDOFF_TOKEN.to_string(),
            handoff_timeout: Duration::from_secs(120),
            pickup_radius: 8.0,
            step_cost: 1,
        }
    }
}

impl DelegationParams {
    pub fn with_capability(mut self, role: Role) -> Self {
        self.capability = role;
        self
    }

    pub fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout = timeout;
        self
    }

    pub fn with_handoff_token(mut self, token: impl Into<String>) -> Self {
        self.handoff_token = token.into();
        self
    }
}
