//! Domain error types

use thiserror::Error;

/// Errors that end a behavior, a delegation or a protocol step.
///
/// Behavior-local variants are narrated to the requester at the point of
/// failure; delegation variants propagate to the behavior that asked for
/// help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("No {resource} source found within {radius} blocks")]
    ResourceNotFound { resource: String, radius: u32 },

    #[error("Ran out of {resource} after using {used}")]
    OutOfResource { resource: String, used: u32 },

    #[error("No collaborator with role '{role}' is available")]
    NoCollaboratorAvailable { role: String },

    #[error("Insufficient credit on plan {plan_id}")]
    InsufficientCredit { plan_id: String },

    #[error("Path unreachable: {0}")]
    PathUnreachable(String),

    #[error("Step not recognized: {0}")]
    StepNotRecognized(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Delegation timed out after {seconds}s waiting for {collaborator}")]
    DelegationTimedOut { collaborator: String, seconds: u64 },

    #[error("Delegated task {task_id} failed: {reason}")]
    DelegationFailed { task_id: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("World error: {0}")]
    World(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Behavior cancelled")]
    Cancelled,
}

impl AgentError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }

    /// Errors raised by the delegation path rather than by local work.
    pub fn is_delegation_error(&self) -> bool {
        matches!(
            self,
            AgentError::NoCollaboratorAvailable { .. }
                | AgentError::InsufficientCredit { .. }
                | AgentError::DelegationTimedOut { .. }
                | AgentError::DelegationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = AgentError::Cancelled;
        assert_eq!(error.to_string(), "Behavior cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(AgentError::Cancelled.is_cancelled());
        assert!(!AgentError::PathUnreachable("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_delegation_errors_are_classified() {
        let err = AgentError::NoCollaboratorAvailable {
            role: "merchant".to_string(),
        };
        assert!(err.is_delegation_error());
        assert_eq!(
            err.to_string(),
            "No collaborator with role 'merchant' is available"
        );

        let err = AgentError::OutOfResource {
            resource: "oak_log".to_string(),
            used: 3,
        };
        assert!(!err.is_delegation_error());
    }
}
