//! Agent configuration container.
//!
//! [`AgentConfig`] groups the split parameter types for a single agent so the
//! composition root can hand each use case the slice it needs.
//!
//! | Type | Executor | Delegation | Step protocol | Session |
//! |------|----------|------------|---------------|---------|
//! | `BehaviorParams` | Yes | No | label only | No |
//! | `WatchdogParams` | Yes | No | No | No |
//! | `DelegationParams` | No | Yes | step cost | No |
//! | `SessionParams` | No | No | No | Yes |

use crate::config::{BehaviorParams, DelegationParams, SessionParams, WatchdogParams};
use blockhand_domain::{ConfigIssue, Role, Severity};

/// Full configuration of one agent.
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    identity: String,
    role: Role,
    behavior: BehaviorParams,
    watchdog: WatchdogParams,
    delegation: DelegationParams,
    session: SessionParams,
}

impl AgentConfig {
    pub fn new(identity: impl Into<String>, role: Role) -> Self {
        Self {
            identity: identity.into(),
            role,
            ..Default::default()
        }
    }

    // ==================== Accessors ====================

    /// In-world display name.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Role advertised in the collaborator registry.
    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn behavior(&self) -> &BehaviorParams {
        &self.behavior
    }

    pub fn watchdog(&self) -> &WatchdogParams {
        &self.watchdog
    }

    pub fn delegation(&self) -> &DelegationParams {
        &self.delegation
    }

    pub fn session(&self) -> &SessionParams {
        &self.session
    }

    // ==================== Builder Methods ====================

    pub fn with_behavior(mut self, behavior: BehaviorParams) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_watchdog(mut self, watchdog: WatchdogParams) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_delegation(mut self, delegation: DelegationParams) -> Self {
        self.delegation = delegation;
        self
    }

    pub fn with_session(mut self, session: SessionParams) -> Self {
        self.session = session;
        self
    }

    // ==================== Validation ====================

    /// Check the combination of parameters.
    ///
    /// An agent must not advertise the capability it buys: delegating to
    /// itself would deadlock its own executor.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.identity.trim().is_empty() {
            issues.push(ConfigIssue::empty("agent.name"));
        }
        if self.behavior.resource.as_str().is_empty() {
            issues.push(ConfigIssue::empty("behavior.resource"));
        }
        if self.behavior.handoff_token != self.delegation.handoff_token {
            issues.push(ConfigIssue::out_of_range(
                "delegation.handoff_token",
                &self.delegation.handoff_token,
                &self.behavior.handoff_token,
            ));
        }
        issues
    }

    /// Check whether any issues are errors (i.e. fatal).
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}
