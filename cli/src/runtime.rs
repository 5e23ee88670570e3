//! Agent wiring: one world body, ledger account, executor, step protocol
//! and session per agent.

use anyhow::{Context, Result};
use blockhand_application::{
    ActionProvider, ActivityLogger, AgentConfig, AgentSession, AgentStateView, BehaviorExecutor,
    DelegationClient, LedgerPort, RegisterAgentUseCase, StepProtocol, WorldError, WorldPort,
};
use blockhand_domain::{Position, ResourceTag, Role};
use blockhand_infrastructure::{JsonFileCollaboratorRegistry, LocalLedger, SimulatedWorld};
use blockhand_presentation::{AgentStatus, ConsoleBackend};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shared adapters every agent is wired against.
pub struct Runtime {
    pub world: Arc<SimulatedWorld>,
    pub ledger: Arc<LocalLedger>,
    pub registry: Arc<JsonFileCollaboratorRegistry>,
    pub activity: Arc<dyn ActivityLogger>,
    pub cancel: CancellationToken,
}

/// A launched agent, as far as the console cares.
pub struct AgentHandle {
    pub name: String,
    pub role: Role,
    pub resource: ResourceTag,
    pub state: AgentStateView,
}

impl Runtime {
    /// Bring an agent into the world and start its loops.
    ///
    /// Agents whose role differs from the delegation capability get a
    /// delegation client; every agent answers tasks addressed to it.
    pub async fn launch(
        &self,
        config: &AgentConfig,
        position: Position,
        inventory: u32,
    ) -> Result<AgentHandle> {
        let name = config.identity().to_string();
        let role = config.role().clone();
        let behavior = config.behavior();

        let body = Arc::new(
            self.world
                .join(&name, position)
                .with_context(|| format!("{} cannot join the world", name))?,
        );
        if inventory > 0 {
            self.world.give(&name, &behavior.resource, inventory)?;
        }
        let port: Arc<dyn WorldPort> = body.clone();
        let account: Arc<dyn LedgerPort> = Arc::new(self.ledger.account(&name));

        let registration = RegisterAgentUseCase::new(account.clone(), self.registry.clone())
            .execute(&name, role.clone())
            .await
            .with_context(|| format!("failed to register {}", name))?;
        self.ledger.adopt(&registration.record);
        info!(
            "{} registered as {} (agent {}, plan {}{})",
            name,
            role,
            registration.record.agent_id,
            registration.record.plan_id,
            if registration.created { ", new" } else { "" }
        );

        let mut executor =
            BehaviorExecutor::new(port.clone(), behavior.clone(), config.watchdog().clone())
                .with_activity_logger(self.activity.clone());
        if role != config.delegation().capability {
            let delegator = DelegationClient::new(
                port.clone(),
                account.clone(),
                self.registry.clone(),
                config.delegation().clone(),
            )
            .with_activity_logger(self.activity.clone());
            executor = executor.with_delegator(Arc::new(delegator));
        }
        let executor = Arc::new(executor);

        let steps = account
            .subscribe_steps(&registration.record.agent_id)
            .await
            .with_context(|| format!("{} cannot subscribe to its steps", name))?;
        let actions: Arc<dyn ActionProvider> = executor.clone();
        let protocol = StepProtocol::new(
            account,
            actions,
            config.delegation().step_cost,
            behavior.resource_label.clone(),
        )
        .with_activity_logger(self.activity.clone());
        let token = self.cancel.child_token();
        tokio::spawn(async move { protocol.run(steps, token).await });

        let session = AgentSession::new(port, executor.clone(), config.session().clone())
            .with_activity_logger(self.activity.clone());
        let token = self.cancel.child_token();
        let session_name = name.clone();
        tokio::spawn(async move {
            if let Err(e) = session.run(token).await {
                warn!("{} stopped: {}", session_name, e);
            }
        });

        body.spawn();
        Ok(AgentHandle {
            name,
            role,
            resource: behavior.resource.clone(),
            state: executor.state(),
        })
    }
}

/// Console view of the simulated world.
pub struct WorldConsole {
    world: Arc<SimulatedWorld>,
    agents: Vec<AgentHandle>,
}

impl WorldConsole {
    pub fn new(world: Arc<SimulatedWorld>, agents: Vec<AgentHandle>) -> Self {
        Self { world, agents }
    }
}

impl ConsoleBackend for WorldConsole {
    fn say(&self, speaker: &str, message: &str) -> Result<(), WorldError> {
        self.world.say(speaker, message)
    }

    fn kick(&self, agent: &str) -> Result<(), WorldError> {
        if !self
            .agents
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(agent))
        {
            return Err(WorldError::Other(format!("{} is not an agent", agent)));
        }
        self.world.disconnect(agent, "kicked from the console")
    }

    fn agents(&self) -> Vec<AgentStatus> {
        self.agents
            .iter()
            .map(|agent| AgentStatus {
                name: agent.name.clone(),
                role: agent.role.clone(),
                connected: self.world.is_connected(&agent.name),
                state: agent.state.snapshot(),
                held: self.world.count_of(&agent.name, &agent.resource),
            })
            .collect()
    }
}
