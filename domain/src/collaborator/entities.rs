//! Collaborator records advertised through the registry.

use crate::ledger::value_objects::{AgentId, PlanId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a collaborator offers to its peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Role {
    /// Gathers and sells raw resources.
    #[default]
    Merchant,
    /// Builds structures and buys resources.
    Builder,
    /// Any role this version does not know about.
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Merchant => "merchant",
            Role::Builder => "builder",
            Role::Other(s) => s,
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "merchant" => Role::Merchant,
            "builder" => Role::Builder,
            other => Role::Other(other.to_string()),
        })
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        let Ok(role) = s.parse::<Role>();
        role
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A peer agent's ledger identity, keyed by its in-world display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorRecord {
    pub identity: String,
    pub agent_id: AgentId,
    pub plan_id: PlanId,
    pub role: Role,
}

impl CollaboratorRecord {
    pub fn new(
        identity: impl Into<String>,
        agent_id: impl Into<AgentId>,
        plan_id: impl Into<PlanId>,
        role: Role,
    ) -> Self {
        Self {
            identity: identity.into(),
            agent_id: agent_id.into(),
            plan_id: plan_id.into(),
            role,
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        &self.role == role
    }
}
