//! Agent state entity.

use super::inventory::Inventory;
use super::value_objects::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The long-running behavior currently occupying the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    #[default]
    Idle,
    Harvesting,
    Building,
    Following,
    Delivering,
}

impl BehaviorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorKind::Idle => "idle",
            BehaviorKind::Harvesting => "harvesting",
            BehaviorKind::Building => "building",
            BehaviorKind::Following => "following",
            BehaviorKind::Delivering => "delivering",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, BehaviorKind::Idle)
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the agent as last observed by the behavior executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub position: Position,
    pub inventory: Inventory,
    pub current_behavior: BehaviorKind,
    pub follow_target: Option<String>,
}

impl AgentState {
    /// Return to idle, dropping any follow target.
    pub fn reset(&mut self) {
        self.current_behavior = BehaviorKind::Idle;
        self.follow_target = None;
    }
}
