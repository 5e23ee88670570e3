//! Agent identity from TOML (`[agent]` section)

use blockhand_domain::{ConfigIssue, Role};
use serde::{Deserialize, Serialize};

/// Raw agent identity from TOML
///
/// # Example
///
/// ```toml
/// [agent]
/// name = "Builder"      # in-world display name, also the registry key
/// role = "builder"      # "builder", "merchant" or any other tag
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentConfig {
    /// Display name of the agent this process drives
    pub name: String,
    /// Role advertised in the collaborator registry
    pub role: String,
}

impl Default for FileAgentConfig {
    fn default() -> Self {
        Self {
            name: "Builder".to_string(),
            role: "builder".to_string(),
        }
    }
}

impl FileAgentConfig {
    /// Parse the role tag. Unknown tags are kept as [`Role::Other`].
    pub fn parse_role(&self) -> Role {
        let Ok(role) = self.role.parse::<Role>();
        role
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.name.trim().is_empty() {
            issues.push(ConfigIssue::empty("agent.name"));
        }
        if self.role.trim().is_empty() {
            issues.push(ConfigIssue::empty("agent.role"));
        }
        issues
    }
}
