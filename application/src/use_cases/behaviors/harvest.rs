//! Harvest: gather until the inventory holds the requested amount.
//!
//! A source only counts when a marker block (leaves, for logs) sits within
//! `marker_radius` of it, which skips log blocks that are part of builds.
//! Each source is worked as a connected cluster, breadth-first over the
//! 26-neighbourhood.

use super::BehaviorExecutor;
use crate::ports::world::{Goal, WorldError};
use crate::use_cases::capabilities::HarvestReport;
use crate::use_cases::watchdog::StallWatchdog;
use blockhand_domain::{AgentError, Block, BlockPos};
use std::collections::{HashSet, VecDeque};
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl BehaviorExecutor {
    pub(super) async fn run_harvest(
        &self,
        amount: u32,
        token: CancellationToken,
    ) -> Result<HarvestReport, AgentError> {
        let held = self.held()?;
        if held >= amount {
            self.narrator
                .say(format!("I already have {} {}", held, self.label()))
                .await;
            return Ok(HarvestReport {
                requested: amount,
                collected: 0,
                held,
            });
        }

        self.narrator
            .say(format!("Harvesting {} {}...", amount - held, self.label()))
            .await;
        let _watchdog = StallWatchdog::spawn(self.world.clone(), &self.watchdog);

        let mut collected = 0u32;
        loop {
            if self.held()? >= amount {
                break;
            }
            let source = self.find_source()?.ok_or_else(|| self.not_found())?;
            debug!("Harvest source at {}", source.position);

            let gathered = self
                .harvest_cluster(source, amount, &mut collected, &token)
                .await?;
            if gathered == 0 {
                return Err(self.not_found());
            }
        }

        let held = self.held()?;
        self.narrator
            .say(format!(
                "Harvested {} {}, now holding {}",
                collected,
                self.label(),
                held
            ))
            .await;
        Ok(HarvestReport {
            requested: amount,
            collected,
            held,
        })
    }

    /// Nearest resource block with a marker in its neighbourhood.
    ///
    /// Markers are gathered up front so the search predicate stays a pure
    /// function of the candidate block.
    fn find_source(&self) -> Result<Option<Block>, AgentError> {
        let here = self.world.position()?.block();
        let marker = &self.params.marker;
        let markers: Vec<BlockPos> = self
            .world
            .blocks_near(
                here,
                self.params.search_radius + self.params.marker_radius,
                &|block: &Block| block.is(marker),
            )?
            .into_iter()
            .map(|block| block.position)
            .collect();
        if markers.is_empty() {
            return Ok(None);
        }

        let resource = &self.params.resource;
        let radius = self.params.marker_radius as i32;
        let is_live = |block: &Block| {
            block.is(resource)
                && markers
                    .iter()
                    .any(|marker| marker.chebyshev(&block.position) <= radius)
        };
        Ok(self
            .world
            .find_nearest_block(&is_live, self.params.search_radius)?)
    }

    /// Collect the cluster connected to `source` until `amount` is held.
    ///
    /// Returns how many blocks were collected from this cluster. Blocks the
    /// agent cannot reach are skipped.
    async fn harvest_cluster(
        &self,
        source: Block,
        amount: u32,
        collected: &mut u32,
        token: &CancellationToken,
    ) -> Result<u32, AgentError> {
        let resource = &self.params.resource;
        let mut queue = VecDeque::from([source.position]);
        let mut seen = HashSet::from([source.position]);
        let mut gathered = 0u32;

        while let Some(position) = queue.pop_front() {
            if token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let Some(block) = self.world.block_at(position)? else {
                continue;
            };
            if !block.is(resource) {
                continue;
            }

            for neighbor in position.neighbors() {
                if seen.insert(neighbor)
                    && let Some(next) = self.world.block_at(neighbor)?
                    && next.is(resource)
                {
                    queue.push_back(neighbor);
                }
            }

            match self.world.path_to(Goal::Block(position)).await {
                Ok(()) => {}
                Err(WorldError::Unreachable(_) | WorldError::OutOfReach(_)) => {
                    debug!("Skipping unreachable block at {}", position);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            match self.world.collect(&block).await {
                Ok(()) => {}
                Err(WorldError::Unreachable(_) | WorldError::OutOfReach(_)) => {
                    debug!("Skipping block out of reach at {}", position);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            self.world.compact_stacks(resource).await?;

            gathered += 1;
            *collected += 1;
            self.refresh_state();

            let held = self.held()?;
            if held >= amount {
                break;
            }
            if self.params.progress_every > 0 && *collected % self.params.progress_every == 0 {
                self.narrator
                    .say(format!(
                        "Progress: {} {} collected, {} to go",
                        collected,
                        self.label(),
                        amount - held
                    ))
                    .await;
            }
        }

        Ok(gathered)
    }

    fn not_found(&self) -> AgentError {
        AgentError::ResourceNotFound {
            resource: self.params.resource.to_string(),
            radius: self.params.search_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BehaviorParams, WatchdogParams};
    use crate::test_support::MockWorld;
    use blockhand_domain::Position;
    use std::sync::Arc;

    fn executor(world: &Arc<MockWorld>) -> BehaviorExecutor {
        BehaviorExecutor::new(
            world.clone(),
            BehaviorParams::default(),
            WatchdogParams::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_have_enough_skips_world() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.give("oak_log", 2);
        world.place_tree(BlockPos::new(5, 0, 5), 4);

        let report = executor(&world).harvest(2).await.unwrap();

        assert!(report.was_already_satisfied());
        assert_eq!(world.chat_log(), vec!["I already have 2 logs".to_string()]);
        assert!(world.goals().is_empty());
        assert_eq!(world.collected_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collects_until_amount_is_held() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.give("oak_log", 1);
        world.place_tree(BlockPos::new(4, 0, 0), 5);

        let report = executor(&world).harvest(4).await.unwrap();

        assert_eq!(report.collected, 3);
        assert_eq!(report.held, 4);
        assert_eq!(world.held("oak_log"), 4);
        // Trunk is collected from the bottom up
        assert_eq!(world.collected_positions()[0], BlockPos::new(4, 0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_moves_on_to_next_tree() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.place_tree(BlockPos::new(3, 0, 0), 2);
        world.place_tree(BlockPos::new(-20, 0, 0), 4);

        let report = executor(&world).harvest(5).await.unwrap();

        assert_eq!(report.collected, 5);
        assert_eq!(world.held("oak_log"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_logs_without_leaves() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.set_block(BlockPos::new(2, 0, 0), "oak_log");
        world.set_block(BlockPos::new(2, 1, 0), "oak_log");

        let err = executor(&world).harvest(1).await.unwrap_err();

        assert_eq!(
            err,
            AgentError::ResourceNotFound {
                resource: "oak_log".to_string(),
                radius: 64,
            }
        );
        assert_eq!(world.collected_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_out_of_trees() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.place_tree(BlockPos::new(3, 0, 0), 2);

        let err = executor(&world).harvest(6).await.unwrap_err();

        assert!(matches!(err, AgentError::ResourceNotFound { .. }));
        assert_eq!(world.held("oak_log"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_narrates_progress() {
        let world = Arc::new(MockWorld::new("Merchant"));
        world.set_position(Position::new(0.5, 0.0, 0.5));
        world.place_tree(BlockPos::new(2, 0, 0), 7);

        executor(&world).harvest(7).await.unwrap();

        let chat = world.chat_log();
        assert_eq!(
            chat.iter().filter(|m| m.starts_with("Progress:")).count(),
            1
        );
        assert_eq!(chat.last().unwrap(), "Harvested 7 logs, now holding 7");
    }
}
