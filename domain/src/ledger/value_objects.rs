//! Ledger identifiers and credit balance.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Ledger identity of an agent that can receive tasks.
    AgentId
);
string_id!(
    /// Identifier of a credits plan gating access to an agent.
    PlanId
);
string_id!(
    /// Identifier of a submitted task.
    TaskId
);
string_id!(
    /// Identifier of a step within a task.
    StepId
);

/// Credits available to this agent on a plan.
///
/// Always fetched fresh before a delegation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreditBalance {
    pub subscribed: bool,
    pub amount: u64,
}

impl CreditBalance {
    pub fn new(subscribed: bool, amount: u64) -> Self {
        Self { subscribed, amount }
    }

    /// Whether a subscription must be purchased before submitting.
    pub fn needs_top_up(&self) -> bool {
        !self.subscribed || self.amount == 0
    }
}
