//! World port
//!
//! Defines the interface between behaviors and the simulated world: entity,
//! block and inventory queries, movement, block interaction and chat.

use async_trait::async_trait;
use blockhand_domain::{
    AgentError, Block, BlockPos, DroppedItem, Face, Inventory, Position, ResourceTag,
};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur during world operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    #[error("Not connected to the world")]
    NotConnected,

    #[error("No path to {0}")]
    Unreachable(String),

    #[error("Out of reach: {0}")]
    OutOfReach(String),

    #[error("Placement blocked at {0}")]
    PlacementBlocked(BlockPos),

    #[error("Not holding any {0}")]
    NotHeld(String),

    #[error("Movement interrupted")]
    Interrupted,

    #[error("Other error: {0}")]
    Other(String),
}

impl From<WorldError> for AgentError {
    fn from(err: WorldError) -> Self {
        match err {
            WorldError::NotConnected => {
                AgentError::ConnectionLost("not connected to the world".to_string())
            }
            WorldError::Unreachable(target) | WorldError::OutOfReach(target) => {
                AgentError::PathUnreachable(target)
            }
            other => AgentError::World(other.to_string()),
        }
    }
}

/// Where a pathing request should end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Goal {
    /// Stand within interaction reach of a block.
    Block(BlockPos),
    /// Get within `range` of a position (stay put if already there).
    Near { position: Position, range: f64 },
    /// Stand exactly at a position.
    Exact(Position),
}

/// Transient movement controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Forward,
    Jump,
    Sneak,
}

/// Events delivered to a subscribed agent.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// A chat line from any player, including this agent.
    Chat { sender: String, message: String },
    /// The agent (re)spawned and is ready to act.
    Spawn,
    /// The connection to the world dropped.
    ConnectionLost { reason: String },
}

/// Predicate used by block searches.
pub type BlockPredicate<'a> = &'a (dyn Fn(&Block) -> bool + Send + Sync);

/// Interface to the world, bound to a single agent body.
///
/// Queries are synchronous snapshots; movement and interaction are the
/// suspension points.
#[async_trait]
pub trait WorldPort: Send + Sync {
    /// Display name of the agent this port controls.
    fn username(&self) -> &str;

    fn is_connected(&self) -> bool;

    fn position(&self) -> Result<Position, WorldError>;

    fn inventory(&self) -> Result<Inventory, WorldError>;

    /// Nearest block within `max_distance` (Chebyshev) matching `predicate`.
    fn find_nearest_block(
        &self,
        predicate: BlockPredicate<'_>,
        max_distance: u32,
    ) -> Result<Option<Block>, WorldError>;

    /// All blocks within `radius` of `center` matching `predicate`.
    fn blocks_near(
        &self,
        center: BlockPos,
        radius: u32,
        predicate: BlockPredicate<'_>,
    ) -> Result<Vec<Block>, WorldError>;

    fn block_at(&self, position: BlockPos) -> Result<Option<Block>, WorldError>;

    /// Position of a visible, connected player. `None` if not visible.
    fn player_position(&self, name: &str) -> Result<Option<Position>, WorldError>;

    fn dropped_items_near(
        &self,
        center: Position,
        radius: f64,
    ) -> Result<Vec<DroppedItem>, WorldError>;

    /// Subscribe to chat, spawn and connection events.
    fn subscribe(&self) -> broadcast::Receiver<WorldEvent>;

    async fn path_to(&self, goal: Goal) -> Result<(), WorldError>;

    /// Abort the current pathing goal.
    fn stop_movement(&self);

    fn set_control_state(&self, control: Control, active: bool);

    fn clear_control_states(&self);

    /// Dig a block and pick up what it drops.
    async fn collect(&self, block: &Block) -> Result<(), WorldError>;

    /// Merge the stacks of `resource` into the fullest slot.
    async fn compact_stacks(&self, resource: &ResourceTag) -> Result<(), WorldError>;

    /// Hold `resource` in hand.
    async fn equip(&self, resource: &ResourceTag) -> Result<(), WorldError>;

    /// Place the held block against `reference` on `face`.
    async fn place(&self, reference: BlockPos, face: Face) -> Result<(), WorldError>;

    async fn look_at(&self, target: Position) -> Result<(), WorldError>;

    /// Throw `count` units of `resource` toward where the agent is looking.
    async fn toss(&self, resource: &ResourceTag, count: u32) -> Result<(), WorldError>;

    async fn pick_up(&self, item: &DroppedItem) -> Result<(), WorldError>;

    async fn send_chat(&self, message: &str) -> Result<(), WorldError>;

    /// Re-establish a dropped session. Emits [`WorldEvent::Spawn`] on success.
    async fn reconnect(&self) -> Result<(), WorldError>;
}
