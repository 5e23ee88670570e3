//! In-process credit ledger.
//!
//! Keeps plans, agents, per-holder balances, tasks and steps in memory and
//! drives the step protocol between a requester and a provider:
//!
//! - `submit_task` burns one credit, records the task, creates its
//!   [`INIT_STEP`] and notifies the provider's step subscription
//! - `create_steps` registers successor steps and notifies the provider
//! - `update_step` mirrors step transitions onto the task: a started step
//!   moves the task to InProgress, a terminal last step completes or fails
//!   it, exactly once

use async_trait::async_trait;
use blockhand_application::ports::ledger::{LedgerError, LedgerPort, LogLevel, TaskSubmission};
use blockhand_domain::{
    AgentId, CollaboratorRecord, CreditBalance, INIT_STEP, PlanId, Step, StepEvent, StepId,
    StepStatus, Task, TaskId, TaskStatus, TaskUpdate,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct TaskRecord {
    task: Task,
    updates: mpsc::UnboundedSender<TaskUpdate>,
    log: Vec<(LogLevel, String)>,
    cost: u64,
}

#[derive(Default)]
struct LedgerBook {
    plans: HashMap<PlanId, String>,
    agents: HashMap<AgentId, String>,
    /// Balance per (holder, plan).
    balances: HashMap<(String, PlanId), CreditBalance>,
    subscribers: HashMap<AgentId, mpsc::UnboundedSender<StepEvent>>,
    tasks: HashMap<TaskId, TaskRecord>,
    steps: HashMap<StepId, Step>,
    next_id: u64,
}

impl LedgerBook {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn notify(&mut self, agent_id: &AgentId, step_id: &StepId) {
        let delivered = self.subscribers.get(agent_id).is_some_and(|tx| {
            tx.send(StepEvent {
                step_id: step_id.clone(),
            })
            .is_ok()
        });
        if !delivered {
            debug!("No step subscriber for {}, {} stays queued", agent_id, step_id);
        }
    }

    /// Move the task owning `step` forward according to the step's status.
    fn mirror(&mut self, step: &Step) {
        let Some(record) = self.tasks.get_mut(&step.task_id) else {
            return;
        };
        record.cost += step.cost;

        let (status, output) = match step.status {
            StepStatus::Pending => return,
            StepStatus::InProgress => (TaskStatus::InProgress, None),
            StepStatus::Completed if step.is_last => {
                (TaskStatus::Completed, step.output.clone())
            }
            StepStatus::Completed => (TaskStatus::InProgress, None),
            StepStatus::Failed => (TaskStatus::Failed, step.output.clone()),
        };

        if record.task.advance(status) {
            let mut update = TaskUpdate::new(step.task_id.clone(), status);
            if let Some(output) = output {
                update = update.with_output(output);
            }
            info!("Task {} is now {}", step.task_id, status);
            let _ = record.updates.send(update);
        }
    }
}

/// Shared in-memory ledger.
pub struct LocalLedger {
    book: Mutex<LedgerBook>,
    /// Credits granted by each `order_plan`.
    credits_per_order: u64,
}

impl LocalLedger {
    pub fn new(credits_per_order: u64) -> Arc<Self> {
        Arc::new(Self {
            book: Mutex::new(LedgerBook::default()),
            credits_per_order,
        })
    }

    /// Port handle acting on behalf of `holder` (an agent's display name).
    pub fn account(self: &Arc<Self>, holder: impl Into<String>) -> LedgerAccount {
        LedgerAccount {
            ledger: Arc::clone(self),
            holder: holder.into(),
        }
    }

    /// Accept an identity created by an earlier run, as found in the
    /// collaborator registry.
    pub fn adopt(&self, record: &CollaboratorRecord) {
        self.with(|book| {
            book.plans
                .entry(record.plan_id.clone())
                .or_insert_with(|| format!("PaymentPlan:::{}", record.identity));
            book.agents
                .entry(record.agent_id.clone())
                .or_insert_with(|| format!("Agent:::{}", record.identity));
        });
    }

    /// Every submitted task, oldest first.
    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.with(|book| book.tasks.keys().cloned().collect());
        ids.sort_by_key(|id| {
            id.as_str()
                .rsplit('-')
                .next()
                .and_then(|n| n.parse::<u64>().ok())
                .unwrap_or(0)
        });
        ids
    }

    pub fn task_status(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.with(|book| book.tasks.get(task_id).map(|r| r.task.status))
    }

    /// Entries written to a task's log stream.
    pub fn task_log(&self, task_id: &TaskId) -> Vec<(LogLevel, String)> {
        self.with(|book| {
            book.tasks
                .get(task_id)
                .map(|r| r.log.clone())
                .unwrap_or_default()
        })
    }

    /// Total cost reported by the task's steps.
    pub fn task_cost(&self, task_id: &TaskId) -> u64 {
        self.with(|book| book.tasks.get(task_id).map_or(0, |r| r.cost))
    }

    fn with<T>(&self, f: impl FnOnce(&mut LedgerBook) -> T) -> T {
        let mut book = self.book.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut book)
    }
}

/// One agent's view of the [`LocalLedger`].
#[derive(Clone)]
pub struct LedgerAccount {
    ledger: Arc<LocalLedger>,
    holder: String,
}

impl LedgerAccount {
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

fn not_found(kind: &'static str, id: impl ToString) -> LedgerError {
    LedgerError::NotFound {
        kind,
        id: id.to_string(),
    }
}

#[async_trait]
impl LedgerPort for LedgerAccount {
    async fn create_credits_plan(&self, name: &str, credits: u64) -> Result<PlanId, LedgerError> {
        let plan_id = self.ledger.with(|book| {
            let plan_id = PlanId::new(book.next("plan"));
            book.plans.insert(plan_id.clone(), name.to_string());
            plan_id
        });
        info!("{} created plan {} ({}, {} credits)", self.holder, plan_id, name, credits);
        Ok(plan_id)
    }

    async fn create_agent(&self, name: &str, plan_id: &PlanId) -> Result<AgentId, LedgerError> {
        self.ledger.with(|book| {
            if !book.plans.contains_key(plan_id) {
                return Err(not_found("plan", plan_id));
            }
            let agent_id = AgentId::new(book.next("agent"));
            book.agents.insert(agent_id.clone(), name.to_string());
            Ok(agent_id)
        })
    }

    async fn get_balance(&self, plan_id: &PlanId) -> Result<CreditBalance, LedgerError> {
        self.ledger.with(|book| {
            if !book.plans.contains_key(plan_id) {
                return Err(not_found("plan", plan_id));
            }
            Ok(book
                .balances
                .get(&(self.holder.clone(), plan_id.clone()))
                .copied()
                .unwrap_or_default())
        })
    }

    async fn order_plan(&self, plan_id: &PlanId) -> Result<(), LedgerError> {
        let grant = self.ledger.credits_per_order;
        self.ledger.with(|book| {
            if !book.plans.contains_key(plan_id) {
                return Err(not_found("plan", plan_id));
            }
            let balance = book
                .balances
                .entry((self.holder.clone(), plan_id.clone()))
                .or_default();
            balance.subscribed = true;
            balance.amount += grant;
            info!(
                "{} ordered plan {}, balance now {}",
                self.holder, plan_id, balance.amount
            );
            Ok(())
        })
    }

    async fn submit_task(
        &self,
        agent_id: &AgentId,
        plan_id: &PlanId,
        query: &str,
    ) -> Result<TaskSubmission, LedgerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let task_id = self.ledger.with(|book| {
            if !book.agents.contains_key(agent_id) {
                return Err(not_found("agent", agent_id));
            }
            let key = (self.holder.clone(), plan_id.clone());
            let balance = book.balances.entry(key).or_default();
            if !balance.subscribed || balance.amount == 0 {
                return Err(LedgerError::InsufficientBalance(plan_id.to_string()));
            }
            balance.amount -= 1;

            let task_id = TaskId::new(book.next("task"));
            let task = Task::submitted(task_id.clone(), agent_id.clone(), plan_id.clone(), query);
            let init = Step::pending(
                StepId::new(book.next("step")),
                task_id.clone(),
                INIT_STEP,
                query,
            );
            let init_id = init.step_id.clone();
            book.steps.insert(init_id.clone(), init);

            let _ = tx.send(TaskUpdate::new(task_id.clone(), TaskStatus::Submitted));
            book.tasks.insert(
                task_id.clone(),
                TaskRecord {
                    task,
                    updates: tx,
                    log: Vec::new(),
                    cost: 0,
                },
            );
            book.notify(agent_id, &init_id);
            Ok(task_id)
        })?;

        info!("{} submitted {} as {} to {}", self.holder, query, task_id, agent_id);
        Ok(TaskSubmission {
            task_id,
            updates: rx,
        })
    }

    async fn subscribe_steps(
        &self,
        agent_id: &AgentId,
    ) -> Result<mpsc::UnboundedReceiver<StepEvent>, LedgerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ledger.with(|book| {
            if !book.agents.contains_key(agent_id) {
                return Err(not_found("agent", agent_id));
            }
            // Replay steps that arrived before the subscription.
            let mut pending: Vec<&Step> = book
                .steps
                .values()
                .filter(|step| {
                    step.status == StepStatus::Pending
                        && book
                            .tasks
                            .get(&step.task_id)
                            .is_some_and(|r| &r.task.agent_id == agent_id)
                })
                .collect();
            pending.sort_by(|a, b| a.step_id.cmp(&b.step_id));
            for step in pending {
                let _ = tx.send(StepEvent {
                    step_id: step.step_id.clone(),
                });
            }
            if book.subscribers.insert(agent_id.clone(), tx).is_some() {
                warn!("Replacing the step subscription of {}", agent_id);
            }
            Ok(())
        })?;
        Ok(rx)
    }

    async fn get_step(&self, step_id: &StepId) -> Result<Step, LedgerError> {
        self.ledger.with(|book| {
            book.steps
                .get(step_id)
                .cloned()
                .ok_or_else(|| not_found("step", step_id))
        })
    }

    async fn create_steps(&self, task_id: &TaskId, steps: Vec<Step>) -> Result<(), LedgerError> {
        self.ledger.with(|book| {
            let agent_id = book
                .tasks
                .get(task_id)
                .map(|r| r.task.agent_id.clone())
                .ok_or_else(|| not_found("task", task_id))?;
            for step in steps {
                if &step.task_id != task_id {
                    return Err(LedgerError::Rejected(format!(
                        "step {} belongs to {}, not {}",
                        step.step_id, step.task_id, task_id
                    )));
                }
                let step_id = step.step_id.clone();
                book.steps.insert(step_id.clone(), step);
                book.notify(&agent_id, &step_id);
            }
            Ok(())
        })
    }

    async fn update_step(&self, step: &Step) -> Result<(), LedgerError> {
        self.ledger.with(|book| {
            let stored = book
                .steps
                .get_mut(&step.step_id)
                .ok_or_else(|| not_found("step", &step.step_id))?;
            if stored.is_terminal() {
                return Err(LedgerError::Rejected(format!(
                    "step {} is already {}",
                    step.step_id, stored.status
                )));
            }
            *stored = step.clone();
            book.mirror(step);
            Ok(())
        })
    }

    async fn log_task(
        &self,
        task_id: &TaskId,
        level: LogLevel,
        message: &str,
    ) -> Result<(), LedgerError> {
        self.ledger.with(|book| {
            let record = book
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| not_found("task", task_id))?;
            debug!("[{}] {}: {}", task_id, level, message);
            record.log.push((level, message.to_string()));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn provider(ledger: &Arc<LocalLedger>) -> (LedgerAccount, AgentId, PlanId) {
        let account = ledger.account("Merchant");
        let plan_id = account
            .create_credits_plan("PaymentPlan:::Merchant", 1)
            .await
            .unwrap();
        let agent_id = account.create_agent("Agent:::Merchant", &plan_id).await.unwrap();
        (account, agent_id, plan_id)
    }

    #[tokio::test]
    async fn test_balance_is_per_holder() {
        let ledger = LocalLedger::new(3);
        let (merchant, _, plan_id) = provider(&ledger).await;
        let builder = ledger.account("Builder");

        assert!(builder.get_balance(&plan_id).await.unwrap().needs_top_up());
        builder.order_plan(&plan_id).await.unwrap();

        assert_eq!(
            builder.get_balance(&plan_id).await.unwrap(),
            CreditBalance::new(true, 3)
        );
        assert_eq!(merchant.get_balance(&plan_id).await.unwrap().amount, 0);
    }

    #[tokio::test]
    async fn test_submission_burns_a_credit_and_refuses_at_zero() {
        let ledger = LocalLedger::new(1);
        let (_, agent_id, plan_id) = provider(&ledger).await;
        let builder = ledger.account("Builder");

        let err = builder
            .submit_task(&agent_id, &plan_id, "!harvest 2")
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InsufficientBalance(plan_id.to_string()));

        builder.order_plan(&plan_id).await.unwrap();
        builder.submit_task(&agent_id, &plan_id, "!harvest 2").await.unwrap();
        assert_eq!(builder.get_balance(&plan_id).await.unwrap().amount, 0);
        assert!(
            builder
                .submit_task(&agent_id, &plan_id, "!harvest 2")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_step_chain_drives_task_updates() {
        let ledger = LocalLedger::new(5);
        let (merchant, agent_id, plan_id) = provider(&ledger).await;
        let builder = ledger.account("Builder");
        builder.order_plan(&plan_id).await.unwrap();

        let mut steps = merchant.subscribe_steps(&agent_id).await.unwrap();
        let mut submission = builder
            .submit_task(&agent_id, &plan_id, "!harvest 4")
            .await
            .unwrap();
        assert_eq!(
            submission.updates.recv().await.unwrap().task_status,
            TaskStatus::Submitted
        );

        let event = steps.recv().await.unwrap();
        let mut init = merchant.get_step(&event.step_id).await.unwrap();
        assert_eq!(init.name, INIT_STEP);
        assert_eq!(init.input_query, "!harvest 4");

        let chain = init.synthesize_successors(&["harvest"]);
        merchant
            .create_steps(&submission.task_id, chain.clone())
            .await
            .unwrap();
        init.complete("!harvest 4", 0, false);
        merchant.update_step(&init).await.unwrap();
        assert_eq!(
            submission.updates.recv().await.unwrap().task_status,
            TaskStatus::InProgress
        );

        let event = steps.recv().await.unwrap();
        let mut work = merchant.get_step(&event.step_id).await.unwrap();
        assert_eq!(work.predecessor, Some(init.step_id.clone()));
        work.start();
        merchant.update_step(&work).await.unwrap();
        work.complete("Harvested 4 logs", 1, true);
        merchant.update_step(&work).await.unwrap();

        let done = submission.updates.recv().await.unwrap();
        assert_eq!(done.task_status, TaskStatus::Completed);
        assert_eq!(done.output.as_deref(), Some("Harvested 4 logs"));
        assert_eq!(ledger.task_cost(&submission.task_id), 1);

        // Terminal steps are sticky.
        work.fail("late");
        assert!(merchant.update_step(&work).await.is_err());
        assert_eq!(
            ledger.task_status(&submission.task_id),
            Some(TaskStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_pending_steps() {
        let ledger = LocalLedger::new(1);
        let (merchant, agent_id, plan_id) = provider(&ledger).await;
        let builder = ledger.account("Builder");
        builder.order_plan(&plan_id).await.unwrap();
        builder.submit_task(&agent_id, &plan_id, "!harvest 1").await.unwrap();

        let mut steps = merchant.subscribe_steps(&agent_id).await.unwrap();
        let event = steps.recv().await.unwrap();
        assert_eq!(merchant.get_step(&event.step_id).await.unwrap().name, INIT_STEP);
    }

    #[tokio::test]
    async fn test_adopted_identity_accepts_submissions() {
        let ledger = LocalLedger::new(1);
        let record = CollaboratorRecord::new(
            "Merchant",
            "agent-41",
            "plan-40",
            blockhand_domain::Role::Merchant,
        );
        ledger.adopt(&record);

        let builder = ledger.account("Builder");
        builder.order_plan(&record.plan_id).await.unwrap();
        let submission = builder
            .submit_task(&record.agent_id, &record.plan_id, "!harvest 1")
            .await
            .unwrap();
        builder
            .log_task(&submission.task_id, LogLevel::Info, "queued")
            .await
            .unwrap();
        assert_eq!(
            ledger.task_log(&submission.task_id),
            vec![(LogLevel::Info, "queued".to_string())]
        );
    }
}
