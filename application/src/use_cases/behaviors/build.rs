//! Build: lay a square platform next to the requester.
//!
//! The corner cell is `platform_offset` blocks along +x from the requester.
//! The agent stands on that corner and places rows from the far edge back
//! toward itself, so the last cell is the one under its own feet and gets
//! the jump-assisted placement.

use super::{BehaviorExecutor, BuildReport};
use crate::ports::world::{Control, Goal, WorldError};
use blockhand_domain::{AgentError, BlockPos, Face};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cells of a `size`×`size` platform anchored at `origin`, in placement
/// order: far row first, each row walked back toward the origin column.
/// The origin itself comes last.
pub(crate) fn platform_cells(origin: BlockPos, size: u32) -> Vec<BlockPos> {
    let size = size as i32;
    (0..size)
        .rev()
        .flat_map(|row| {
            (0..size)
                .rev()
                .map(move |col| origin.offset(col, 0, row))
        })
        .collect()
}

impl BehaviorExecutor {
    pub(super) async fn run_build(
        &self,
        size: u32,
        requester: &str,
        token: CancellationToken,
    ) -> Result<BuildReport, AgentError> {
        if size <= 1 {
            return Err(AgentError::InvalidArgument(format!(
                "platform size must be greater than 1, got {}",
                size
            )));
        }
        let required = size.checked_mul(size).ok_or_else(|| {
            AgentError::InvalidArgument(format!("platform size {} is too large", size))
        })?;

        let held = self.held()?;
        let mut received = 0;
        if held < required {
            let shortfall = required - held;
            let delegator = self
                .delegator
                .as_ref()
                .ok_or_else(|| AgentError::NoCollaboratorAvailable {
                    role: "any".to_string(),
                })?;
            self.narrator
                .say(format!(
                    "I need {} more {}, asking for help",
                    shortfall,
                    self.label()
                ))
                .await;
            let receipt = delegator
                .request_resources(self.params.resource.as_str(), shortfall, &token)
                .await?;
            received = receipt.received;
        }

        let anchor = self
            .world
            .player_position(requester)?
            .ok_or_else(|| {
                AgentError::PathUnreachable(format!("{} is not visible", requester))
            })?;
        let origin = anchor.block().offset(self.params.platform_offset, 0, 0);

        self.narrator
            .say(format!("Building a {}x{} platform", size, size))
            .await;
        self.world.path_to(Goal::Exact(origin.center())).await?;

        let cells = platform_cells(origin, size);
        let total = cells.len();
        let mut placed = 0u32;
        for (index, cell) in cells.into_iter().enumerate() {
            if token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if self.held()? == 0 {
                return Err(AgentError::OutOfResource {
                    resource: self.params.resource.to_string(),
                    used: placed,
                });
            }

            self.world.equip(&self.params.resource).await?;
            let standing = self.world.position()?.block();
            let result = if standing == cell {
                self.place_underfoot(cell).await
            } else {
                self.world.place(cell.offset(0, -1, 0), Face::Up).await
            };
            match result {
                Ok(()) => placed += 1,
                Err(WorldError::PlacementBlocked(at)) => {
                    debug!("Cell {} already occupied, skipping", at);
                }
                Err(e) => return Err(e.into()),
            }

            let quarter = (index + 1) * 4 / total;
            if quarter > index * 4 / total && quarter < 4 {
                self.narrator
                    .say(format!("Platform {}% done", quarter * 25))
                    .await;
            }
        }

        self.narrator
            .say(format!(
                "Finished the {}x{} platform using {} {}",
                size,
                size,
                placed,
                self.label()
            ))
            .await;
        Ok(BuildReport {
            size,
            placed,
            received,
        })
    }

    /// Place into the agent's own cell: jump, then place on top of the
    /// block below while airborne.
    async fn place_underfoot(&self, cell: BlockPos) -> Result<(), WorldError> {
        self.world.set_control_state(Control::Jump, true);
        tokio::time::sleep(self.params.jump_delay).await;
        let result = self.world.place(cell.offset(0, -1, 0), Face::Up).await;
        self.world.set_control_state(Control::Jump, false);
        result
    }
}
