//! Shared agent state.
//!
//! The executor is the only writer. Everything else (the dispatcher, the
//! console, tests) observes through [`AgentStateView`].

use blockhand_domain::{AgentState, BehaviorKind, Inventory, Position};
use std::sync::{Arc, PoisonError, RwLock};

/// Writable handle to the agent state, owned by the executor.
#[derive(Debug, Clone, Default)]
pub struct AgentStateCell(Arc<RwLock<AgentState>>);

impl AgentStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AgentStateView {
        AgentStateView(self.0.clone())
    }

    pub(crate) fn set_behavior(&self, kind: BehaviorKind) {
        self.write(|state| state.current_behavior = kind);
    }

    pub(crate) fn set_following(&self, target: &str) {
        self.write(|state| {
            state.current_behavior = BehaviorKind::Following;
            state.follow_target = Some(target.to_string());
        });
    }

    pub(crate) fn refresh(&self, position: Position, inventory: Inventory) {
        self.write(|state| {
            state.position = position;
            state.inventory = inventory;
        });
    }

    pub(crate) fn reset(&self) {
        self.write(AgentState::reset);
    }

    fn write(&self, f: impl FnOnce(&mut AgentState)) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

/// Read-only view of the agent state.
#[derive(Debug, Clone)]
pub struct AgentStateView(Arc<RwLock<AgentState>>);

impl AgentStateView {
    pub fn snapshot(&self) -> AgentState {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_behavior(&self) -> BehaviorKind {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current_behavior
    }

    pub fn follow_target(&self) -> Option<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .follow_target
            .clone()
    }
}
