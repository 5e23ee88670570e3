//! Application-level configuration.
//!
//! Parameter types that control how use cases behave:
//!
//! - [`BehaviorParams`] / [`WatchdogParams`]: behavior executor tuning
//! - [`DelegationParams`]: task delegation and step protocol
//! - [`SessionParams`]: greeting and reconnection policy
//! - [`AgentConfig`]: container holding all of the above for one agent

pub mod agent_config;
pub mod behavior_params;
pub mod delegation_params;
pub mod session_params;

pub use agent_config::AgentConfig;
pub use behavior_params::{
    BehaviorParams, DEFAULT_HANDOFF_TOKEN, HANDOFF_EMPTY_TOKEN, WatchdogParams,
};
pub use delegation_params::DelegationParams;
pub use session_params::SessionParams;
