//! Core domain concepts shared across all subdomains.
//!
//! - [`error::AgentError`]: the failure taxonomy for behaviors and delegation

pub mod error;
