//! Behavior Executor
//!
//! Runs the agent's long-running behaviors: harvest, build, come, follow
//! and deliver. Harvest, Build, Deliver and Come hold a single exclusive
//! slot so they never overlap, whether they were asked for in chat or by a
//! delegated task. Follow runs as a periodic pursuit task outside the slot
//! and is torn down by anything that takes it.
//!
//! Every behavior narrates to chat and leaves the agent Idle when it ends.

mod build;
mod deliver;
mod follow;
mod harvest;
pub mod state;

pub use state::{AgentStateCell, AgentStateView};

use crate::config::{BehaviorParams, WatchdogParams};
use crate::ports::activity_logger::{ActivityEvent, ActivityLogger, NoActivityLogger};
use crate::ports::world::WorldPort;
use crate::use_cases::capabilities::{
    ActionProvider, DeliverReport, HarvestReport, ResourceDelegator,
};
use crate::use_cases::narration::Narrator;
use crate::use_cases::periodic::PeriodicTask;
use async_trait::async_trait;
use blockhand_domain::{AgentError, BehaviorKind, ChatCommand, Command};
use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of a completed platform build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub size: u32,
    pub placed: u32,
    /// Units obtained from a collaborator before building.
    pub received: u32,
}

/// What a successfully executed command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorOutcome {
    Harvested(HarvestReport),
    Built(BuildReport),
    Arrived,
    Following(String),
    StoppedFollowing,
    Delivered(DeliverReport),
}

/// Executes behaviors for one agent body.
pub struct BehaviorExecutor {
    world: Arc<dyn WorldPort>,
    params: BehaviorParams,
    watchdog: WatchdogParams,
    state: AgentStateCell,
    /// Held for the whole run of an exclusive behavior.
    slot: tokio::sync::Mutex<()>,
    pursuit: Mutex<Option<PeriodicTask>>,
    current: Mutex<CancellationToken>,
    /// Bumped by [`abandon`](Self::abandon); work started under an older
    /// epoch is discarded.
    epoch: AtomicU64,
    delegator: Option<Arc<dyn ResourceDelegator>>,
    activity: Arc<dyn ActivityLogger>,
    narrator: Narrator,
}

impl BehaviorExecutor {
    pub fn new(
        world: Arc<dyn WorldPort>,
        params: BehaviorParams,
        watchdog: WatchdogParams,
    ) -> Self {
        Self {
            narrator: Narrator::new(world.clone()),
            world,
            params,
            watchdog,
            state: AgentStateCell::new(),
            slot: tokio::sync::Mutex::new(()),
            pursuit: Mutex::new(None),
            current: Mutex::new(CancellationToken::new()),
            epoch: AtomicU64::new(0),
            delegator: None,
            activity: Arc::new(NoActivityLogger),
        }
    }

    /// Set the capability Build uses to cover a shortfall.
    pub fn with_delegator(mut self, delegator: Arc<dyn ResourceDelegator>) -> Self {
        self.delegator = Some(delegator);
        self
    }

    /// Set an activity logger for structured event logging.
    pub fn with_activity_logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.activity = logger;
        self
    }

    pub fn params(&self) -> &BehaviorParams {
        &self.params
    }

    pub fn state(&self) -> AgentStateView {
        self.state.view()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Whether a follow pursuit task is currently running.
    pub fn is_following(&self) -> bool {
        self.pursuit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(PeriodicTask::is_active)
    }

    /// Route a parsed chat command to its behavior.
    pub async fn execute(&self, command: &ChatCommand) -> Result<BehaviorOutcome, AgentError> {
        let requester = command.requester.as_str();
        match command.command {
            Command::Harvest(amount) => {
                self.harvest(amount).await.map(BehaviorOutcome::Harvested)
            }
            Command::Platform(size) => {
                self.build(size, requester).await.map(BehaviorOutcome::Built)
            }
            Command::Come => self.come(requester).await.map(|_| BehaviorOutcome::Arrived),
            Command::Follow => {
                self.follow(requester).await;
                Ok(BehaviorOutcome::Following(requester.to_string()))
            }
            Command::StopFollow => {
                self.stop_follow().await;
                Ok(BehaviorOutcome::StoppedFollowing)
            }
            Command::Throw => {
                self.deliver(requester)
                    .await
                    .map(BehaviorOutcome::Delivered)
            }
        }
    }

    pub async fn harvest(&self, amount: u32) -> Result<HarvestReport, AgentError> {
        self.exclusive(BehaviorKind::Harvesting, "harvest", |token| {
            self.run_harvest(amount, token)
        })
        .await
    }

    pub async fn build(&self, size: u32, requester: &str) -> Result<BuildReport, AgentError> {
        self.exclusive(BehaviorKind::Building, "build the platform", |token| {
            self.run_build(size, requester, token)
        })
        .await
    }

    pub async fn deliver(&self, requester: &str) -> Result<DeliverReport, AgentError> {
        self.exclusive(BehaviorKind::Delivering, "deliver", |token| {
            self.run_deliver(requester, token)
        })
        .await
    }

    /// Drop everything: cancel the running behavior and any pursuit, reset
    /// to Idle and invalidate work queued under the current epoch.
    pub fn abandon(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        self.stop_pursuit();
        self.state.reset();
        info!("Abandoned in-flight behaviors (epoch {})", epoch);
    }

    /// Run `run` while holding the behavior slot.
    ///
    /// Any pursuit is stopped first. Failures other than cancellation are
    /// narrated as "Could not {action}: {error}".
    async fn exclusive<T, F, Fut>(
        &self,
        kind: BehaviorKind,
        action: &str,
        run: F,
    ) -> Result<T, AgentError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let epoch = self.epoch();
        let _slot = self.slot.lock().await;
        if epoch != self.epoch() {
            return Err(AgentError::Cancelled);
        }

        self.stop_pursuit();
        let token = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        self.state.set_behavior(kind);
        self.refresh_state();
        info!("{} started {}", self.world.username(), kind);
        self.activity.log(ActivityEvent::new(
            "behavior_started",
            json!({ "agent": self.world.username(), "behavior": kind.as_str() }),
        ));

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(AgentError::Cancelled),
            result = run(token.clone()) => result,
        };

        self.refresh_state();
        self.state.reset();

        match &result {
            Ok(_) => {
                info!("{} finished {}", self.world.username(), kind);
                self.activity.log(ActivityEvent::new(
                    "behavior_finished",
                    json!({ "agent": self.world.username(), "behavior": kind.as_str() }),
                ));
            }
            Err(e) if e.is_cancelled() => {
                info!("{} cancelled {}", self.world.username(), kind);
            }
            Err(e) => {
                warn!("{} failed {}: {}", self.world.username(), kind, e);
                self.narrator.say(format!("Could not {}: {}", action, e)).await;
                self.activity.log(ActivityEvent::new(
                    "behavior_failed",
                    json!({
                        "agent": self.world.username(),
                        "behavior": kind.as_str(),
                        "error": e.to_string(),
                    }),
                ));
            }
        }
        result
    }

    /// Cancel the pursuit task, if any. Returns whether one was running.
    fn stop_pursuit(&self) -> bool {
        let previous = self
            .pursuit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match previous {
            Some(task) => {
                task.cancel();
                if self.state.view().current_behavior() == BehaviorKind::Following {
                    self.state.reset();
                }
                true
            }
            None => false,
        }
    }

    /// Units of the configured resource currently held.
    fn held(&self) -> Result<u32, AgentError> {
        Ok(self.world.inventory()?.count(&self.params.resource))
    }

    fn refresh_state(&self) {
        if let (Ok(position), Ok(inventory)) = (self.world.position(), self.world.inventory()) {
            self.state.refresh(position, inventory);
        }
    }

    fn label(&self) -> &str {
        &self.params.resource_label
    }
}

#[async_trait]
impl ActionProvider for BehaviorExecutor {
    async fn harvest(&self, amount: u32) -> Result<HarvestReport, AgentError> {
        BehaviorExecutor::harvest(self, amount).await
    }

    async fn deliver(&self, requester: &str) -> Result<DeliverReport, AgentError> {
        BehaviorExecutor::deliver(self, requester).await
    }
}
