//! Register agent use case
//!
//! Makes sure this agent is purchasable by its peers before it starts
//! accepting work.
//!
//! 1. **Look up** - An existing registry record under the agent's name is
//!    reused, so restarts keep the same ledger identity.
//! 2. **Create** - Otherwise a one-credit plan `PaymentPlan:::<name>` and an
//!    agent `Agent:::<name>` are created in the ledger.
//! 3. **Publish** - The record is merged into the registry under the name.

use crate::ports::ledger::LedgerPort;
use blockhand_domain::{AgentError, CollaboratorRecord, CollaboratorRepository, Role};
use std::sync::Arc;
use tracing::info;

/// Credits granted by the plan created for a new agent.
pub const REGISTRATION_PLAN_CREDITS: u64 = 1;

/// Result of registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub record: CollaboratorRecord,
    /// Whether a new ledger identity was created.
    pub created: bool,
}

pub struct RegisterAgentUseCase<R: CollaboratorRepository> {
    ledger: Arc<dyn LedgerPort>,
    registry: Arc<R>,
}

impl<R: CollaboratorRepository> RegisterAgentUseCase<R> {
    pub fn new(ledger: Arc<dyn LedgerPort>, registry: Arc<R>) -> Self {
        Self { ledger, registry }
    }

    pub async fn execute(&self, name: &str, role: Role) -> Result<Registration, AgentError> {
        let existing = self
            .registry
            .get(name)
            .await
            .map_err(|e| AgentError::Registry(e.to_string()))?;

        if let Some(record) = existing {
            if record.role == role {
                info!("{} already registered as {}", name, record.agent_id);
                return Ok(Registration {
                    record,
                    created: false,
                });
            }
            // Same ledger identity, new advertised role.
            let record = CollaboratorRecord { role, ..record };
            self.publish(&record).await?;
            return Ok(Registration {
                record,
                created: false,
            });
        }

        let plan_id = self
            .ledger
            .create_credits_plan(&format!("PaymentPlan:::{}", name), REGISTRATION_PLAN_CREDITS)
            .await?;
        let agent_id = self
            .ledger
            .create_agent(&format!("Agent:::{}", name), &plan_id)
            .await?;
        info!("Registered {} as {} on plan {}", name, agent_id, plan_id);

        let record = CollaboratorRecord::new(name, agent_id, plan_id, role);
        self.publish(&record).await?;
        Ok(Registration {
            record,
            created: true,
        })
    }

    async fn publish(&self, record: &CollaboratorRecord) -> Result<(), AgentError> {
        self.registry
            .upsert(record.clone())
            .await
            .map_err(|e| AgentError::Registry(e.to_string()))
    }
}
