//! Delegation and session settings from TOML (`[delegation]`, `[session]`)

use super::positive_or;
use blockhand_application::config::{DEFAULT_HANDOFF_TOKEN, DelegationParams, SessionParams};
use blockhand_domain::{ConfigIssue, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw delegation configuration from TOML
///
/// # Example
///
/// ```toml
/// [delegation]
/// capability = "merchant"        # role to buy missing resources from
/// handoff_timeout_secs = 120     # submit → handoff token, end to end
/// pickup_radius = 8.0
/// step_cost = 1                  # credits charged per completed work step
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDelegationConfig {
    pub capability: String,
    pub handoff_timeout_secs: u64,
    pub pickup_radius: f64,
    pub step_cost: u64,
}

impl Default for FileDelegationConfig {
    fn default() -> Self {
        let params = DelegationParams::default();
        Self {
            capability: params.capability.to_string(),
            handoff_timeout_secs: params.handoff_timeout.as_secs(),
            pickup_radius: params.pickup_radius,
            step_cost: params.step_cost,
        }
    }
}

impl FileDelegationConfig {
    /// Convert to [`DelegationParams`]. The handoff token is shared with
    /// `[behavior]` so both sides of an exchange agree on it.
    pub fn to_delegation_params(&self, handoff_token: &str) -> (DelegationParams, Vec<ConfigIssue>) {
        let defaults = DelegationParams::default();
        let mut issues = Vec::new();

        let Ok(capability) = self.capability.parse::<Role>();
        let token = if handoff_token.trim().is_empty() {
            DEFAULT_HANDOFF_TOKEN
        } else {
            handoff_token
        };

        let params = DelegationParams {
            capability,
            handoff_token: token.to_string(),
            handoff_timeout: Duration::from_secs(positive_or(
                "delegation.handoff_timeout_secs",
                self.handoff_timeout_secs,
                defaults.handoff_timeout.as_secs(),
                &mut issues,
            )),
            pickup_radius: positive_or(
                "delegation.pickup_radius",
                self.pickup_radius,
                defaults.pickup_radius,
                &mut issues,
            ),
            step_cost: self.step_cost,
        };
        (params, issues)
    }
}

/// Raw session configuration from TOML
///
/// ```toml
/// [session]
/// greeting = "Hello! Bot connected successfully."
/// max_reconnect_attempts = 3
/// backoff_base_ms = 1000        # attempt n waits base * 2^n
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSessionConfig {
    pub greeting: String,
    pub max_reconnect_attempts: u32,
    pub backoff_base_ms: u64,
}

impl Default for FileSessionConfig {
    fn default() -> Self {
        let params = SessionParams::default();
        Self {
            greeting: params.greeting,
            max_reconnect_attempts: params.max_reconnect_attempts,
            backoff_base_ms: params.backoff_base.as_millis() as u64,
        }
    }
}

impl FileSessionConfig {
    pub fn to_session_params(&self) -> (SessionParams, Vec<ConfigIssue>) {
        let defaults = SessionParams::default();
        let mut issues = Vec::new();
        let params = SessionParams {
            greeting: self.greeting.clone(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            backoff_base: Duration::from_millis(positive_or(
                "session.backoff_base_ms",
                self.backoff_base_ms,
                defaults.backoff_base.as_millis() as u64,
                &mut issues,
            )),
        };
        (params, issues)
    }
}
