//! Step Protocol State Machine (provider role)
//!
//! A delegated task reaches the provider as a chain of steps. The `init`
//! step is answered by synthesizing the work chain; the `harvest` work step
//! runs the harvest behavior and reports the result as the task's last
//! step. Every transition is written to the task's log stream.
//!
//! Events are handled one at a time and a failure on one event never stops
//! the loop.

use crate::ports::activity_logger::{ActivityEvent, ActivityLogger, NoActivityLogger};
use crate::ports::ledger::{LedgerPort, LogLevel};
use crate::use_cases::capabilities::ActionProvider;
use blockhand_domain::{AgentError, Command, HARVEST_STEP, INIT_STEP, Step, StepEvent, TaskId};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What handling one step event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step or its task had already finished.
    Skipped,
    /// `init` completed and `successors` new steps were registered.
    Initialized { successors: usize },
    /// The work step completed; the task is done.
    Completed,
    /// The work step failed; the task is done.
    Failed,
}

/// Provider-side handler for inbound step events.
pub struct StepProtocol {
    ledger: Arc<dyn LedgerPort>,
    actions: Arc<dyn ActionProvider>,
    step_cost: u64,
    resource_label: String,
    activity: Arc<dyn ActivityLogger>,
}

impl StepProtocol {
    pub fn new(
        ledger: Arc<dyn LedgerPort>,
        actions: Arc<dyn ActionProvider>,
        step_cost: u64,
        resource_label: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            actions,
            step_cost,
            resource_label: resource_label.into(),
            activity: Arc::new(NoActivityLogger),
        }
    }

    /// Set an activity logger for structured event logging.
    pub fn with_activity_logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.activity = logger;
        self
    }

    /// Consume step events until `cancel` fires or the stream ends.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<StepEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match self.handle(&event).await {
                Ok(outcome) => debug!("Step {} handled: {:?}", event.step_id, outcome),
                Err(e) => warn!("Step {} failed to process: {}", event.step_id, e),
            }
        }
        debug!("Step protocol loop stopped");
    }

    /// Handle a single step event.
    pub async fn handle(&self, event: &StepEvent) -> Result<StepOutcome, AgentError> {
        let step = self.ledger.get_step(&event.step_id).await?;
        if step.is_terminal() || self.task_closed(&step).await? {
            debug!("Skipping step {} ({})", step.step_id, step.status);
            return Ok(StepOutcome::Skipped);
        }

        info!("Processing step {} ({})", step.step_id, step.name);
        self.activity.log(ActivityEvent::new(
            "step_received",
            json!({
                "step_id": step.step_id.as_str(),
                "task_id": step.task_id.as_str(),
                "name": step.name,
            }),
        ));

        let name = step.name.clone();
        match name.as_str() {
            INIT_STEP => self.initialize(step).await,
            HARVEST_STEP => self.work(step).await,
            other => {
                warn!("Step {} has unknown name '{}'", step.step_id, other);
                self.log(
                    &step.task_id,
                    LogLevel::Warn,
                    &format!("Step {} not recognized", other),
                )
                .await;
                Err(AgentError::StepNotRecognized(other.to_string()))
            }
        }
    }

    /// Answer `init`: register the work chain and echo the input.
    async fn initialize(&self, mut step: Step) -> Result<StepOutcome, AgentError> {
        self.log(
            &step.task_id,
            LogLevel::Info,
            &format!("Processing step {}...", step.name),
        )
        .await;

        let successors = step.synthesize_successors(&[HARVEST_STEP]);
        let count = successors.len();
        self.ledger.create_steps(&step.task_id, successors).await?;

        let input = step.input_query.clone();
        step.complete(input, 0, false);
        self.ledger.update_step(&step).await?;
        self.log(
            &step.task_id,
            LogLevel::Info,
            &format!("Step {} completed", step.name),
        )
        .await;

        Ok(StepOutcome::Initialized { successors: count })
    }

    /// Run the work step. Either way it is the task's last step.
    async fn work(&self, mut step: Step) -> Result<StepOutcome, AgentError> {
        let amount = match Command::parse(&step.input_query) {
            Ok(Some(Command::Harvest(amount))) => amount,
            _ => {
                warn!(
                    "Step {} input not recognized: {}",
                    step.step_id, step.input_query
                );
                step.fail("Command not recognized");
                return self.finish(step, StepOutcome::Failed).await;
            }
        };

        step.start();
        if let Err(e) = self.ledger.update_step(&step).await {
            warn!("Step {} could not be started: {}", step.step_id, e);
            step.fail(format!("Could not start: {}", e));
            if let Err(e) = self.ledger.update_step(&step).await {
                warn!("Step {} could not be marked failed: {}", step.step_id, e);
            }
            return Err(e.into());
        }
        self.log(
            &step.task_id,
            LogLevel::Info,
            &format!("Harvesting {} {}...", amount, self.resource_label),
        )
        .await;

        match self.actions.harvest(amount).await {
            Ok(report) => {
                debug!("Harvest for step {} done: {:?}", step.step_id, report);
                step.complete(
                    format!("Harvested {} {}", amount, self.resource_label),
                    self.step_cost,
                    true,
                );
                self.finish(step, StepOutcome::Completed).await
            }
            Err(e) => {
                warn!("Harvest for step {} failed: {}", step.step_id, e);
                step.fail(e.to_string());
                self.finish(step, StepOutcome::Failed).await
            }
        }
    }

    /// Write the terminal step. If the write fails the stored step stays
    /// open, so a redelivered event runs it again.
    async fn finish(&self, step: Step, outcome: StepOutcome) -> Result<StepOutcome, AgentError> {
        self.ledger.update_step(&step).await?;

        let output = step.output.as_deref().unwrap_or_default();
        let level = match outcome {
            StepOutcome::Failed => LogLevel::Error,
            _ => LogLevel::Info,
        };
        self.log(
            &step.task_id,
            level,
            &format!("Step {} {}: {}", step.name, step.status, output),
        )
        .await;
        self.activity.log(ActivityEvent::new(
            "step_finished",
            json!({
                "step_id": step.step_id.as_str(),
                "task_id": step.task_id.as_str(),
                "status": step.status.to_string(),
                "output": output,
            }),
        ));
        Ok(outcome)
    }

    /// A task is closed once the step before this one was its last.
    async fn task_closed(&self, step: &Step) -> Result<bool, AgentError> {
        let Some(predecessor) = &step.predecessor else {
            return Ok(false);
        };
        let previous = self.ledger.get_step(predecessor).await?;
        Ok(previous.is_last && previous.is_terminal())
    }

    async fn log(&self, task_id: &TaskId, level: LogLevel, message: &str) {
        if let Err(e) = self.ledger.log_task(task_id, level, message).await {
            warn!("Failed to write task log for {}: {}", task_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockLedger;
    use crate::use_cases::capabilities::{DeliverReport, HarvestReport};
    use async_trait::async_trait;
    use blockhand_domain::{StepId, StepStatus};
    use std::sync::Mutex;

    struct MockActions {
        result: Result<HarvestReport, AgentError>,
        calls: Mutex<Vec<u32>>,
    }

    impl MockActions {
        fn ok() -> Self {
            Self::with(Ok(HarvestReport {
                requested: 11,
                collected: 11,
                held: 11,
            }))
        }

        fn with(result: Result<HarvestReport, AgentError>) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionProvider for MockActions {
        async fn harvest(&self, amount: u32) -> Result<HarvestReport, AgentError> {
            self.calls.lock().unwrap().push(amount);
            self.result.clone()
        }

        async fn deliver(&self, requester: &str) -> Result<DeliverReport, AgentError> {
            Ok(DeliverReport {
                requester: requester.to_string(),
                thrown: 0,
            })
        }
    }

    fn protocol(ledger: &Arc<MockLedger>, actions: &Arc<MockActions>) -> StepProtocol {
        StepProtocol::new(ledger.clone(), actions.clone(), 1, "logs")
    }

    fn init_step() -> Step {
        Step::pending(
            StepId::new("step-1"),
            TaskId::new("task-1"),
            INIT_STEP,
            "!harvest 11",
        )
    }

    fn harvest_step(input: &str) -> Step {
        Step::pending(
            StepId::new("step-1.1-harvest"),
            TaskId::new("task-1"),
            HARVEST_STEP,
            input,
        )
        .with_predecessor(StepId::new("step-1"))
    }

    fn event(id: &str) -> StepEvent {
        StepEvent {
            step_id: StepId::new(id),
        }
    }

    #[tokio::test]
    async fn test_init_synthesizes_harvest_step() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        ledger.put_step(init_step());

        let outcome = protocol(&ledger, &actions)
            .handle(&event("step-1"))
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Initialized { successors: 1 });
        let created = ledger.created_steps();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, HARVEST_STEP);
        assert_eq!(created[0].predecessor, Some(StepId::new("step-1")));
        assert_eq!(created[0].input_query, "!harvest 11");

        let init = ledger.step("step-1").unwrap();
        assert_eq!(init.status, StepStatus::Completed);
        assert_eq!(init.output.as_deref(), Some("!harvest 11"));
        assert!(!init.is_last);
        assert!(actions.calls().is_empty());
    }

    #[tokio::test]
    async fn test_harvest_step_completes_task() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        ledger.put_step(harvest_step("!harvest 11"));

        let outcome = protocol(&ledger, &actions)
            .handle(&event("step-1.1-harvest"))
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Completed);
        assert_eq!(actions.calls(), vec![11]);

        let statuses: Vec<_> = ledger.updated_steps().iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![StepStatus::InProgress, StepStatus::Completed]);

        let step = ledger.step("step-1.1-harvest").unwrap();
        assert_eq!(step.output.as_deref(), Some("Harvested 11 logs"));
        assert_eq!(step.cost, 1);
        assert!(step.is_last);
        assert!(ledger.logs().len() >= 2);
    }

    #[tokio::test]
    async fn test_harvest_failure_fails_step_with_diagnostic() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::with(Err(AgentError::ResourceNotFound {
            resource: "oak_log".to_string(),
            radius: 64,
        })));
        ledger.put_step(harvest_step("!harvest 4"));

        let outcome = protocol(&ledger, &actions)
            .handle(&event("step-1.1-harvest"))
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Failed);
        let step = ledger.step("step-1.1-harvest").unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(
            step.output.as_deref(),
            Some("No oak_log source found within 64 blocks")
        );
        assert!(step.is_last);
        assert!(ledger.logs().iter().any(|(_, level, _)| *level == LogLevel::Error));
    }

    #[tokio::test]
    async fn test_unparsable_input_fails_without_work() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        ledger.put_step(harvest_step("bring me cake"));

        let outcome = protocol(&ledger, &actions)
            .handle(&event("step-1.1-harvest"))
            .await
            .unwrap();

        assert_eq!(outcome, StepOutcome::Failed);
        assert!(actions.calls().is_empty());
        let step = ledger.step("step-1.1-harvest").unwrap();
        assert_eq!(step.output.as_deref(), Some("Command not recognized"));
    }

    #[tokio::test]
    async fn test_unknown_step_name_is_not_mutated() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        ledger.put_step(Step::pending(
            StepId::new("step-9"),
            TaskId::new("task-9"),
            "paint",
            "",
        ));

        let err = protocol(&ledger, &actions)
            .handle(&event("step-9"))
            .await
            .unwrap_err();

        assert_eq!(err, AgentError::StepNotRecognized("paint".to_string()));
        assert!(ledger.updated_steps().is_empty());
        assert_eq!(
            ledger.step("step-9").unwrap().status,
            StepStatus::Pending
        );
        assert!(ledger.logs().iter().any(|(_, level, _)| *level == LogLevel::Warn));
    }

    #[tokio::test]
    async fn test_terminal_steps_and_finished_tasks_are_skipped() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        let protocol = protocol(&ledger, &actions);
        ledger.put_step(harvest_step("!harvest 11"));
        protocol.handle(&event("step-1.1-harvest")).await.unwrap();

        // Redelivered event for a finished step
        let outcome = protocol.handle(&event("step-1.1-harvest")).await.unwrap();
        assert_eq!(outcome, StepOutcome::Skipped);

        // A stray pending step of the same, finished task
        ledger.put_step(
            Step::pending(
                StepId::new("step-1.2-harvest"),
                TaskId::new("task-1"),
                HARVEST_STEP,
                "!harvest 11",
            )
            .with_predecessor(StepId::new("step-1.1-harvest")),
        );
        let outcome = protocol.handle(&event("step-1.2-harvest")).await.unwrap();
        assert_eq!(outcome, StepOutcome::Skipped);
        assert_eq!(actions.calls(), vec![11]);
    }

    #[tokio::test]
    async fn test_rejected_terminal_write_is_retried_on_redelivery() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        let protocol = protocol(&ledger, &actions);
        ledger.put_step(harvest_step("!harvest 11"));
        ledger.fail_terminal_updates(1);

        let err = protocol
            .handle(&event("step-1.1-harvest"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Ledger(_)));
        assert_eq!(
            ledger.step("step-1.1-harvest").unwrap().status,
            StepStatus::InProgress
        );

        let outcome = protocol.handle(&event("step-1.1-harvest")).await.unwrap();
        assert_eq!(outcome, StepOutcome::Completed);
        assert_eq!(
            ledger.step("step-1.1-harvest").unwrap().status,
            StepStatus::Completed
        );
        assert_eq!(actions.calls(), vec![11, 11]);
    }

    #[tokio::test]
    async fn test_rejected_start_marks_step_failed() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        ledger.put_step(harvest_step("!harvest 11"));
        ledger.fail_updates(1);

        let result = protocol(&ledger, &actions)
            .handle(&event("step-1.1-harvest"))
            .await;

        assert!(result.is_err());
        assert!(actions.calls().is_empty());
        let step = ledger.step("step-1.1-harvest").unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert!(step.is_last);
    }

    #[tokio::test]
    async fn test_run_survives_failing_events() {
        let ledger = Arc::new(MockLedger::new());
        let actions = Arc::new(MockActions::ok());
        ledger.put_step(init_step());
        let protocol = protocol(&ledger, &actions);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(event("missing")).unwrap();
        tx.send(event("step-1")).unwrap();
        drop(tx);
        protocol.run(rx, CancellationToken::new()).await;

        assert_eq!(
            ledger.step("step-1").unwrap().status,
            StepStatus::Completed
        );
    }
}
