//! Task Delegation Client
//!
//! Buys resources from a peer agent through the ledger:
//!
//! 1. discover the nearest visible collaborator with the needed role
//! 2. make sure the plan has credit, ordering it if needed
//! 3. submit `!harvest <n>` as a task and follow its status updates
//! 4. on completion ask the collaborator to throw the items over
//! 5. wait for the handoff token in chat and pick up what landed
//!
//! Steps 3 to 5 are bounded by the handoff timeout. Nothing is retried.

use crate::config::{DelegationParams, HANDOFF_EMPTY_TOKEN};
use crate::ports::activity_logger::{ActivityEvent, ActivityLogger, NoActivityLogger};
use crate::ports::ledger::{LedgerPort, TaskSubmission};
use crate::ports::world::{Goal, WorldEvent, WorldPort};
use crate::use_cases::capabilities::{DelegationReceipt, ResourceDelegator};
use crate::use_cases::narration::Narrator;
use async_trait::async_trait;
use blockhand_domain::{
    AgentError, CollaboratorRecord, CollaboratorRepository, Command, CreditBalance, ResourceTag,
    Task, TaskId, TaskStatus, TaskUpdate,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Requester side of the delegation protocol.
pub struct DelegationClient<R: CollaboratorRepository> {
    world: Arc<dyn WorldPort>,
    ledger: Arc<dyn LedgerPort>,
    registry: Arc<R>,
    params: DelegationParams,
    activity: Arc<dyn ActivityLogger>,
    narrator: Narrator,
}

impl<R: CollaboratorRepository + 'static> DelegationClient<R> {
    pub fn new(
        world: Arc<dyn WorldPort>,
        ledger: Arc<dyn LedgerPort>,
        registry: Arc<R>,
        params: DelegationParams,
    ) -> Self {
        Self {
            narrator: Narrator::new(world.clone()),
            world,
            ledger,
            registry,
            params,
            activity: Arc::new(NoActivityLogger),
        }
    }

    /// Set an activity logger for structured event logging.
    pub fn with_activity_logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.activity = logger;
        self
    }

    /// Nearest visible collaborator advertising the needed role.
    ///
    /// The registry is read fresh on every call.
    pub async fn discover(&self) -> Result<CollaboratorRecord, AgentError> {
        let records = self
            .registry
            .all()
            .await
            .map_err(|e| AgentError::Registry(e.to_string()))?;
        let me = self.world.username();
        let here = self.world.position()?;

        let mut best: Option<(f64, CollaboratorRecord)> = None;
        for record in records
            .into_iter()
            .filter(|r| r.has_role(&self.params.capability) && r.identity != me)
        {
            let Some(position) = self.world.player_position(&record.identity)? else {
                debug!("{} is not visible, skipping", record.identity);
                continue;
            };
            let distance = here.distance_to(&position);
            if best.as_ref().is_none_or(|(nearest, _)| distance < *nearest) {
                best = Some((distance, record));
            }
        }

        best.map(|(_, record)| record)
            .ok_or_else(|| AgentError::NoCollaboratorAvailable {
                role: self.params.capability.to_string(),
            })
    }

    /// Make sure the collaborator's plan has credit, ordering it if needed.
    pub async fn ensure_credit(
        &self,
        collaborator: &CollaboratorRecord,
    ) -> Result<CreditBalance, AgentError> {
        let plan_id = &collaborator.plan_id;
        let mut balance = self.ledger.get_balance(plan_id).await?;
        if balance.needs_top_up() {
            info!("Ordering plan {} for {}", plan_id, collaborator.identity);
            self.ledger.order_plan(plan_id).await?;
            balance = self.ledger.get_balance(plan_id).await?;
        }
        if balance.amount == 0 {
            return Err(AgentError::InsufficientCredit {
                plan_id: plan_id.to_string(),
            });
        }
        Ok(balance)
    }

    /// Run the whole exchange for `amount` units of `resource`.
    pub async fn request(
        &self,
        resource: &ResourceTag,
        amount: u32,
        cancel: &CancellationToken,
    ) -> Result<DelegationReceipt, AgentError> {
        let collaborator = self.discover().await?;
        self.ensure_credit(&collaborator).await?;

        // Subscribe before submitting so the handoff token cannot slip by.
        let mut chat = self.world.subscribe();
        let query = Command::Harvest(amount).encode();
        let TaskSubmission {
            task_id,
            mut updates,
        } = self
            .ledger
            .submit_task(&collaborator.agent_id, &collaborator.plan_id, &query)
            .await?;

        info!(
            "Submitted task {} to {}: {}",
            task_id, collaborator.identity, query
        );
        self.activity.log(ActivityEvent::new(
            "task_submitted",
            json!({
                "task_id": task_id.as_str(),
                "collaborator": collaborator.identity,
                "query": query,
            }),
        ));
        self.narrator
            .say(format!(
                "Asked {} for {} {}",
                collaborator.identity, amount, resource
            ))
            .await;

        let mut task = Task::submitted(
            task_id.clone(),
            collaborator.agent_id.clone(),
            collaborator.plan_id.clone(),
            query,
        );
        self.narrate_waiting(&collaborator, task.status).await;
        let timeout = self.params.handoff_timeout;
        let exchange = async {
            self.await_completion(&collaborator, &mut task, &mut updates)
                .await?;
            self.await_handoff(&collaborator, &task_id, &mut chat).await
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            result = tokio::time::timeout(timeout, exchange) => match result {
                Ok(outcome) => outcome?,
                Err(_) => {
                    warn!("Handoff from {} timed out", collaborator.identity);
                    return Err(AgentError::DelegationTimedOut {
                        collaborator: collaborator.identity.clone(),
                        seconds: timeout.as_secs(),
                    });
                }
            },
        }

        let received = self.pick_up_drops(resource).await?;
        self.narrator
            .say(format!(
                "Got {} {} from {}",
                received, resource, collaborator.identity
            ))
            .await;
        Ok(DelegationReceipt {
            task_id,
            collaborator: collaborator.identity,
            received,
        })
    }

    /// Follow the task's updates until it completes or fails.
    async fn await_completion(
        &self,
        collaborator: &CollaboratorRecord,
        task: &mut Task,
        updates: &mut mpsc::UnboundedReceiver<TaskUpdate>,
    ) -> Result<(), AgentError> {
        loop {
            let Some(update) = updates.recv().await else {
                return Err(AgentError::DelegationFailed {
                    task_id: task.task_id.to_string(),
                    reason: "update stream closed".to_string(),
                });
            };
            if update.task_id != task.task_id || !task.advance(update.task_status) {
                continue;
            }
            self.activity.log(ActivityEvent::new(
                "task_update",
                json!({
                    "task_id": task.task_id.as_str(),
                    "status": update.task_status.as_str(),
                }),
            ));

            match update.task_status {
                TaskStatus::Submitted | TaskStatus::InProgress => {
                    self.narrate_waiting(collaborator, update.task_status).await;
                }
                TaskStatus::Completed => {
                    self.world
                        .send_chat(&format!(
                            "@{} {}",
                            collaborator.identity,
                            Command::Throw.encode()
                        ))
                        .await?;
                    self.narrator
                        .say(format!(
                            "{} is done, waiting for the handoff",
                            collaborator.identity
                        ))
                        .await;
                    return Ok(());
                }
                TaskStatus::Failed => {
                    let reason = update
                        .output
                        .unwrap_or_else(|| "no reason given".to_string());
                    self.narrator
                        .say(format!(
                            "{} could not do it: {}",
                            collaborator.identity, reason
                        ))
                        .await;
                    return Err(AgentError::DelegationFailed {
                        task_id: task.task_id.to_string(),
                        reason,
                    });
                }
            }
        }
    }

    async fn narrate_waiting(&self, collaborator: &CollaboratorRecord, status: TaskStatus) {
        self.narrator
            .say(format!("Waiting for {} ({})", collaborator.identity, status))
            .await;
    }

    /// Wait for the collaborator to announce the items are on the ground,
    /// or that it has nothing to give.
    async fn await_handoff(
        &self,
        collaborator: &CollaboratorRecord,
        task_id: &TaskId,
        chat: &mut broadcast::Receiver<WorldEvent>,
    ) -> Result<(), AgentError> {
        loop {
            match chat.recv().await {
                Ok(WorldEvent::Chat { sender, message }) if sender == collaborator.identity => {
                    if message.contains(&self.params.handoff_token) {
                        debug!("Handoff token received from {}", sender);
                        return Ok(());
                    }
                    if message.contains(HANDOFF_EMPTY_TOKEN) {
                        warn!("{} had nothing to hand off", sender);
                        return Err(AgentError::DelegationFailed {
                            task_id: task_id.to_string(),
                            reason: format!("{} had nothing to throw", sender),
                        });
                    }
                }
                Ok(WorldEvent::ConnectionLost { reason }) => {
                    return Err(AgentError::ConnectionLost(reason));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Chat subscription lagged by {} messages", skipped);
                }
                Err(RecvError::Closed) => {
                    return Err(AgentError::ConnectionLost(
                        "world event stream closed".to_string(),
                    ));
                }
            }
        }
    }

    /// Pick up every drop of `resource` within the pickup radius.
    ///
    /// Returns how many units were added to the inventory.
    async fn pick_up_drops(&self, resource: &ResourceTag) -> Result<u32, AgentError> {
        let before = self.world.inventory()?.count(resource);
        let here = self.world.position()?;
        let items = self
            .world
            .dropped_items_near(here, self.params.pickup_radius)?;

        for item in items.iter().filter(|item| &item.resource == resource) {
            self.world.path_to(Goal::Exact(item.position)).await?;
            if let Err(e) = self.world.pick_up(item).await {
                debug!("Could not pick up item {}: {}", item.id, e);
            }
        }

        let after = self.world.inventory()?.count(resource);
        Ok(after.saturating_sub(before))
    }
}

#[async_trait]
impl<R: CollaboratorRepository + 'static> ResourceDelegator for DelegationClient<R> {
    async fn request_resources(
        &self,
        resource: &str,
        amount: u32,
        cancel: &CancellationToken,
    ) -> Result<DelegationReceipt, AgentError> {
        self.request(&ResourceTag::new(resource), amount, cancel)
            .await
    }
}
