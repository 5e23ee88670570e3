//! Agent session supervisor.
//!
//! Consumes the world event stream of one agent: greets on spawn, routes
//! chat to the [`CommandDispatcher`], and on connection loss abandons the
//! current work and reconnects with exponential backoff.

use crate::config::SessionParams;
use crate::ports::activity_logger::{ActivityEvent, ActivityLogger, NoActivityLogger};
use crate::ports::world::{WorldEvent, WorldPort};
use crate::use_cases::behaviors::BehaviorExecutor;
use crate::use_cases::dispatcher::{CommandDispatcher, DispatchWorker};
use crate::use_cases::narration::Narrator;
use blockhand_domain::AgentError;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct AgentSession {
    world: Arc<dyn WorldPort>,
    executor: Arc<BehaviorExecutor>,
    dispatcher: CommandDispatcher,
    worker: DispatchWorker,
    params: SessionParams,
    /// Subscribed at construction so no event emitted after `new` is missed.
    events: broadcast::Receiver<WorldEvent>,
    activity: Arc<dyn ActivityLogger>,
    narrator: Narrator,
}

impl AgentSession {
    pub fn new(
        world: Arc<dyn WorldPort>,
        executor: Arc<BehaviorExecutor>,
        params: SessionParams,
    ) -> Self {
        let (dispatcher, worker) = CommandDispatcher::new(world.clone(), executor.clone());
        Self {
            events: world.subscribe(),
            narrator: Narrator::new(world.clone()),
            world,
            executor,
            dispatcher,
            worker,
            params,
            activity: Arc::new(NoActivityLogger),
        }
    }

    // ==================== Builder Methods ====================

    /// Set an activity logger for structured event logging.
    pub fn with_activity_logger(mut self, logger: Arc<dyn ActivityLogger>) -> Self {
        self.activity = logger;
        self
    }

    /// Run until `cancel` fires (`Ok`) or reconnection is exhausted.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), AgentError> {
        let Self {
            world,
            executor,
            dispatcher,
            worker,
            params,
            mut events,
            activity,
            narrator,
        } = self;

        let worker_token = cancel.child_token();
        let worker_handle = tokio::spawn(worker.run(worker_token.clone()));
        let name = world.username().to_string();

        let result = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                event = events.recv() => event,
            };

            match event {
                Ok(WorldEvent::Spawn) => {
                    info!("{} spawned", name);
                    narrator.say(&params.greeting).await;
                }
                Ok(WorldEvent::Chat { sender, message }) => {
                    dispatcher.handle_chat(&sender, &message).await;
                }
                Ok(WorldEvent::ConnectionLost { reason }) => {
                    warn!("{} lost connection: {}", name, reason);
                    executor.abandon();
                    activity.log(ActivityEvent::new(
                        "connection_lost",
                        json!({ "agent": name, "reason": reason }),
                    ));
                    match reconnect(world.as_ref(), &params, &cancel).await {
                        Ok(true) => {
                            activity.log(ActivityEvent::new(
                                "reconnected",
                                json!({ "agent": name }),
                            ));
                        }
                        Ok(false) => break Ok(()),
                        Err(attempts) => {
                            error!("{} gave up after {} reconnection attempts", name, attempts);
                            break Err(AgentError::ConnectionLost(reason));
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} skipped {} world events", name, skipped);
                }
                Err(RecvError::Closed) => {
                    break Err(AgentError::ConnectionLost(
                        "world event stream closed".to_string(),
                    ));
                }
            }
        };

        worker_token.cancel();
        if let Err(e) = worker_handle.await {
            warn!("Dispatch worker ended abnormally: {}", e);
        }
        result
    }
}

/// Retry `reconnect` with backoff. `Ok(false)` means cancelled while
/// waiting; `Err(n)` means all `n` attempts failed.
async fn reconnect(
    world: &dyn WorldPort,
    params: &SessionParams,
    cancel: &CancellationToken,
) -> Result<bool, u32> {
    for attempt in 1..=params.max_reconnect_attempts {
        let delay = params.backoff(attempt);
        info!(
            "Reconnecting {} in {:?} (attempt {}/{})",
            world.username(),
            delay,
            attempt,
            params.max_reconnect_attempts
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(false),
            _ = tokio::time::sleep(delay) => {}
        }
        match world.reconnect().await {
            Ok(()) => return Ok(true),
            Err(e) => warn!("Reconnection attempt {} failed: {}", attempt, e),
        }
    }
    Err(params.max_reconnect_attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BehaviorParams, WatchdogParams};
    use crate::test_support::MockWorld;
    use std::time::Duration;

    fn session(world: &Arc<MockWorld>) -> (AgentSession, Arc<BehaviorExecutor>) {
        let executor = Arc::new(BehaviorExecutor::new(
            world.clone(),
            BehaviorParams::default(),
            WatchdogParams::default(),
        ));
        let session = AgentSession::new(world.clone(), executor.clone(), SessionParams::default());
        (session, executor)
    }

    fn lost() -> WorldEvent {
        WorldEvent::ConnectionLost {
            reason: "kicked".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_greets_on_spawn_and_dispatches_chat() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.give("oak_log", 2);
        let (session, _) = session(&world);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(session.run(cancel.clone()));

        world.emit(WorldEvent::Spawn);
        world.hear("Steve", "@Merchant !harvest 1");
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(
            world.chat_log(),
            vec!["Hello! Bot connected successfully.", "I already have 2 logs"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_with_backoff_and_greets_again() {
        let world = Arc::new(MockWorld::new("Merchant"));
        let (session, _) = session(&world);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(session.run(cancel.clone()));

        world.fail_reconnects(1);
        let started = tokio::time::Instant::now();
        world.emit(lost());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(world.reconnect_attempts(), 1);
        assert!(world.chat_log().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(world.reconnect_attempts(), 2);
        assert!(world.is_connected());
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(world.chat_log(), vec!["Hello! Bot connected successfully."]);

        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let world = Arc::new(MockWorld::new("Merchant"));
        let (session, executor) = session(&world);
        let epoch = executor.epoch();
        let handle = tokio::spawn(session.run(CancellationToken::new()));

        world.fail_reconnects(10);
        world.emit(lost());

        let result = handle.await.unwrap();
        assert_eq!(result, Err(AgentError::ConnectionLost("kicked".to_string())));
        assert_eq!(world.reconnect_attempts(), 3);
        assert!(executor.epoch() > epoch);
        assert!(executor.state().current_behavior().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let world = Arc::new(MockWorld::new("Merchant"));
        let (session, _) = session(&world);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(session.run(cancel.clone()));

        world.emit(lost());
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert!(handle.await.unwrap().is_ok());
        assert_eq!(world.reconnect_attempts(), 0);
    }
}
