//! Deliver: throw every held unit to the requester, then announce the
//! handoff so the requester knows the items are on the ground.

use super::BehaviorExecutor;
use crate::config::HANDOFF_EMPTY_TOKEN;
use crate::ports::world::Goal;
use crate::use_cases::capabilities::DeliverReport;
use blockhand_domain::AgentError;
use tokio_util::sync::CancellationToken;

impl BehaviorExecutor {
    pub(super) async fn run_deliver(
        &self,
        requester: &str,
        token: CancellationToken,
    ) -> Result<DeliverReport, AgentError> {
        let held = self.held()?;
        if held == 0 {
            self.narrator
                .say(format!(
                    "@{} Nothing to throw {}",
                    requester, HANDOFF_EMPTY_TOKEN
                ))
                .await;
            return Err(AgentError::OutOfResource {
                resource: self.params.resource.to_string(),
                used: 0,
            });
        }

        let target = self.world.player_position(requester)?.ok_or_else(|| {
            AgentError::PathUnreachable(format!("{} is not visible", requester))
        })?;
        self.world
            .path_to(Goal::Near {
                position: target,
                range: self.params.deliver_distance,
            })
            .await?;
        self.world
            .look_at(target.offset(0.0, self.params.aim_height, 0.0))
            .await?;

        self.narrator
            .say(format!(
                "Throwing {} {} to {}",
                held,
                self.label(),
                requester
            ))
            .await;

        let mut thrown = 0u32;
        while thrown < held {
            if token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if thrown > 0 {
                tokio::time::sleep(self.params.throw_delay).await;
            }
            self.world.toss(&self.params.resource, 1).await?;
            thrown += 1;
        }

        self.world.send_chat(&self.params.handoff_token).await?;
        Ok(DeliverReport {
            requester: requester.to_string(),
            thrown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BehaviorParams, DEFAULT_HANDOFF_TOKEN, WatchdogParams};
    use crate::test_support::MockWorld;
    use blockhand_domain::Position;
    use std::sync::Arc;
    use std::time::Duration;

    fn executor(world: &Arc<MockWorld>) -> BehaviorExecutor {
        BehaviorExecutor::new(
            world.clone(),
            BehaviorParams::default(),
            WatchdogParams::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_throws_one_unit_at_a_time_then_signals() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.give("oak_log", 3);
        world.add_player("Builder", Position::new(8.5, 0.0, 0.5));

        let started = tokio::time::Instant::now();
        let report = executor(&world).deliver("Builder").await.unwrap();

        assert_eq!(report.thrown, 3);
        assert_eq!(world.tosses(), vec![1, 1, 1]);
        assert_eq!(world.held("oak_log"), 0);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(
            world.look_target(),
            Some(Position::new(8.5, 1.0, 0.5))
        );
        assert_eq!(world.chat_log().last().unwrap(), DEFAULT_HANDOFF_TOKEN);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_to_deliver() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.add_player("Builder", Position::new(8.5, 0.0, 0.5));

        let err = executor(&world).deliver("Builder").await.unwrap_err();

        assert!(matches!(err, AgentError::OutOfResource { used: 0, .. }));
        assert!(world.tosses().is_empty());
        let chat = world.chat_log();
        assert!(!chat.iter().any(|m| m == DEFAULT_HANDOFF_TOKEN));
        assert_eq!(
            chat.last().map(String::as_str),
            Some("@Builder Nothing to throw #handoff-empty")
        );
    }
}
