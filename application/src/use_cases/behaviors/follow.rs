//! Come, Follow and StopFollow.

use super::BehaviorExecutor;
use crate::ports::activity_logger::ActivityEvent;
use crate::ports::world::Goal;
use crate::use_cases::periodic::PeriodicTask;
use blockhand_domain::{AgentError, BehaviorKind};
use serde_json::json;
use std::sync::PoisonError;
use tracing::{debug, info};

impl BehaviorExecutor {
    /// Walk to the requester once. Reported as Following while it runs.
    pub async fn come(&self, requester: &str) -> Result<(), AgentError> {
        self.exclusive(BehaviorKind::Following, "reach you", |_token| async move {
            let position = self.world.player_position(requester)?.ok_or_else(|| {
                AgentError::PathUnreachable(format!("{} is not visible", requester))
            })?;
            self.world
                .path_to(Goal::Near {
                    position,
                    range: self.params.follow_distance,
                })
                .await?;
            self.narrator.say(format!("I'm here, {}", requester)).await;
            Ok(())
        })
        .await
    }

    /// Start pursuing `target`, replacing any existing pursuit.
    ///
    /// Waits for a running exclusive behavior to finish, then returns as
    /// soon as the pursuit task is spawned.
    pub async fn follow(&self, target: &str) {
        let _slot = self.slot.lock().await;

        let world = self.world.clone();
        let name = target.to_string();
        let range = self.params.follow_distance;
        let ticker = PeriodicTask::spawn(self.params.follow_interval, move || {
            let world = world.clone();
            let name = name.clone();
            async move {
                match world.player_position(&name) {
                    Ok(Some(position)) => {
                        if let Err(e) = world.path_to(Goal::Near { position, range }).await {
                            debug!("Pursuit of {} failed this tick: {}", name, e);
                        }
                    }
                    Ok(None) => debug!("{} is not visible, holding position", name),
                    Err(e) => debug!("Pursuit skipped a tick: {}", e),
                }
            }
        });

        let previous = self
            .pursuit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ticker);
        if let Some(previous) = previous {
            previous.cancel();
        }
        self.state.set_following(target);

        info!("{} following {}", self.world.username(), target);
        self.activity.log(ActivityEvent::new(
            "behavior_started",
            json!({ "agent": self.world.username(), "behavior": "following", "target": target }),
        ));
        self.narrator.say(format!("Following {}", target)).await;
    }

    /// Tear down the pursuit and halt movement.
    pub async fn stop_follow(&self) {
        let stopped = self.stop_pursuit();
        self.world.stop_movement();
        self.world.clear_control_states();
        if stopped {
            self.activity.log(ActivityEvent::new(
                "behavior_finished",
                json!({ "agent": self.world.username(), "behavior": "following" }),
            ));
            self.narrator.say("Stopped following").await;
        } else {
            self.narrator.say("I wasn't following anyone").await;
        }
    }
}
