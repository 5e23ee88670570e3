//! Command Dispatcher
//!
//! Turns chat lines into behavior invocations. Only lines addressed to this
//! agent are considered; the rest of the line is parsed with the command
//! grammar. Accepted commands go onto a FIFO queue drained by a single
//! [`DispatchWorker`], so a command sent while a long behavior runs waits
//! its turn.

use crate::ports::world::WorldPort;
use crate::use_cases::behaviors::BehaviorExecutor;
use crate::use_cases::narration::Narrator;
use blockhand_domain::{ChatCommand, Command, CommandError, strip_address};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the dispatcher did with a chat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not for us, from us, or not a known command.
    Ignored,
    /// A known verb with a bad argument; the usage was narrated.
    Rejected(CommandError),
    /// Accepted and queued for execution.
    Queued(ChatCommand),
}

struct QueuedCommand {
    command: ChatCommand,
    /// Executor epoch at the time the command was accepted.
    epoch: u64,
}

/// Chat front end of one agent.
pub struct CommandDispatcher {
    own_name: String,
    executor: Arc<BehaviorExecutor>,
    queue: mpsc::UnboundedSender<QueuedCommand>,
    narrator: Narrator,
}

/// Drains the dispatcher's queue, one command at a time.
pub struct DispatchWorker {
    executor: Arc<BehaviorExecutor>,
    queue: mpsc::UnboundedReceiver<QueuedCommand>,
}

impl CommandDispatcher {
    pub fn new(
        world: Arc<dyn WorldPort>,
        executor: Arc<BehaviorExecutor>,
    ) -> (Self, DispatchWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            own_name: world.username().to_string(),
            executor: executor.clone(),
            queue: tx,
            narrator: Narrator::new(world),
        };
        let worker = DispatchWorker {
            executor,
            queue: rx,
        };
        (dispatcher, worker)
    }

    /// Handle one chat line from `sender`.
    pub async fn handle_chat(&self, sender: &str, message: &str) -> DispatchOutcome {
        if sender.eq_ignore_ascii_case(&self.own_name) {
            return DispatchOutcome::Ignored;
        }
        let Some(body) = strip_address(message, &self.own_name) else {
            return DispatchOutcome::Ignored;
        };

        match Command::parse(&body) {
            Ok(None) => {
                debug!("No command in message from {}: {}", sender, message);
                DispatchOutcome::Ignored
            }
            Err(e) => {
                self.narrator.say(e.to_string()).await;
                DispatchOutcome::Rejected(e)
            }
            Ok(Some(command)) => {
                let command = ChatCommand::new(command, sender);
                info!("{} queued {} from {}", self.own_name, command.command.encode(), sender);
                let queued = QueuedCommand {
                    command: command.clone(),
                    epoch: self.executor.epoch(),
                };
                if self.queue.send(queued).is_err() {
                    warn!("Dispatch worker has stopped, dropping {:?}", command);
                    return DispatchOutcome::Ignored;
                }
                DispatchOutcome::Queued(command)
            }
        }
    }
}

impl DispatchWorker {
    /// Execute queued commands until `cancel` fires or the dispatcher is
    /// dropped. Commands accepted before the last abandon are discarded.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let queued = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                queued = self.queue.recv() => match queued {
                    Some(queued) => queued,
                    None => break,
                },
            };

            if queued.epoch != self.executor.epoch() {
                debug!("Discarding stale command {:?}", queued.command);
                continue;
            }
            match self.executor.execute(&queued.command).await {
                Ok(outcome) => debug!("Command finished: {:?}", outcome),
                Err(e) => debug!("Command {:?} ended with {}", queued.command.command, e),
            }
        }
    }
}
