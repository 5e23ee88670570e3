//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application parameter
//! types, with every out-of-range value reported as a [`ConfigIssue`].

mod agent;
mod behavior;
mod delegation;
mod runtime;
mod simulation;

pub use agent::FileAgentConfig;
pub use behavior::{FileBehaviorConfig, FileWatchdogConfig};
pub use delegation::{FileDelegationConfig, FileSessionConfig};
pub use runtime::{FileLoggingConfig, FileRegistryConfig};
pub use simulation::{FilePeerConfig, FileSimulationConfig, FileTreeConfig};

use blockhand_application::AgentConfig;
use blockhand_domain::{ConfigIssue, Role};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Identity of the agent this process drives
    pub agent: FileAgentConfig,
    /// Behavior tuning
    pub behavior: FileBehaviorConfig,
    /// Stall watchdog
    pub watchdog: FileWatchdogConfig,
    /// Delegation client and step protocol
    pub delegation: FileDelegationConfig,
    /// Greeting and reconnection
    pub session: FileSessionConfig,
    /// Collaborator registry location
    pub registry: FileRegistryConfig,
    /// Log destinations
    pub logging: FileLoggingConfig,
    /// Simulated world layout
    pub simulation: FileSimulationConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.agent.validate();
        let (_, conversion_issues) = self.agent_config_for(&self.agent.name, self.agent.parse_role());
        issues.extend(conversion_issues);
        issues.extend(self.simulation.validate(&self.agent.name));
        issues
    }

    /// Application configuration for the agent named in `[agent]`.
    pub fn to_agent_config(&self) -> (AgentConfig, Vec<ConfigIssue>) {
        self.agent_config_for(&self.agent.name, self.agent.parse_role())
    }

    /// Application configuration for any agent sharing these settings,
    /// such as a simulated peer.
    pub fn agent_config_for(&self, name: &str, role: Role) -> (AgentConfig, Vec<ConfigIssue>) {
        let (behavior, mut issues) = self.behavior.to_behavior_params();
        let (watchdog, watchdog_issues) = self.watchdog.to_watchdog_params();
        let (delegation, delegation_issues) = self
            .delegation
            .to_delegation_params(&behavior.handoff_token);
        let (session, session_issues) = self.session.to_session_params();
        issues.extend(watchdog_issues);
        issues.extend(delegation_issues);
        issues.extend(session_issues);

        let config = AgentConfig::new(name, role)
            .with_behavior(behavior)
            .with_watchdog(watchdog)
            .with_delegation(delegation)
            .with_session(session);
        (config, issues)
    }
}

/// `value` if it is strictly positive, otherwise `fallback` plus a warning.
fn positive_or<T>(field: &str, value: T, fallback: T, issues: &mut Vec<ConfigIssue>) -> T
where
    T: PartialOrd + Default + Display + Copy,
{
    if value > T::default() {
        value
    } else {
        issues.push(ConfigIssue::out_of_range(field, value, fallback));
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[agent]
name = "Builder"
role = "builder"

[behavior]
resource = "spruce_log"
resource_label = "spruce logs"

[watchdog]
threshold = 4

[delegation]
handoff_timeout_secs = 60

[session]
max_reconnect_attempts = 5

[registry]
path = "/tmp/registry.json"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let (agent, issues) = config.to_agent_config();
        assert!(issues.is_empty());
        assert_eq!(agent.identity(), "Builder");
        assert_eq!(agent.role(), &Role::Builder);
        assert_eq!(agent.behavior().resource.as_str(), "spruce_log");
        assert_eq!(agent.watchdog().threshold, 4);
        assert_eq!(agent.delegation().handoff_timeout, Duration::from_secs(60));
        assert_eq!(agent.session().max_reconnect_attempts, 5);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: FileConfig = toml::from_str("[agent]\nname = \"Alex\"\n").unwrap();
        assert_eq!(config.agent.name, "Alex");
        assert_eq!(config.agent.role, "builder");
        assert_eq!(config.behavior, FileBehaviorConfig::default());
    }

    #[test]
    fn test_validate_valid_config() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_collects_every_section() {
        let toml_str = r#"
[agent]
name = ""

[watchdog]
threshold = 0

[session]
backoff_base_ms = 0
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();
        assert_eq!(issues.len(), 3);
        assert_eq!(issues.iter().filter(|i| i.is_error()).count(), 1);
    }

    #[test]
    fn test_peer_config_shares_handoff_token() {
        let toml_str = r##"
[behavior]
handoff_token = "#ready"
"##;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let (peer, _) = config.agent_config_for("Merchant", Role::Merchant);
        assert_eq!(peer.behavior().handoff_token, "#ready");
        assert_eq!(peer.delegation().handoff_token, "#ready");
        assert!(peer.validate().is_empty());
    }
}
