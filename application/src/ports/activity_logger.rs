//! Port for structured activity logging.
//!
//! Defines the [`ActivityLogger`] trait for recording what the agent did
//! (behaviors started and finished, tasks submitted, steps processed) to a
//! structured log.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostic messages, while this port captures the agent's
//! activity in a machine-readable format (JSONL).

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A structured activity event for logging.
pub struct ActivityEvent {
    /// Event type identifier (e.g., "behavior_started", "task_update").
    pub event_type: &'static str,
    /// When the event happened.
    pub at: DateTime<Utc>,
    /// JSON payload with event-specific data.
    pub payload: Value,
}

impl ActivityEvent {
    /// Create a new activity event stamped with the current UTC time.
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            at: Utc::now(),
            payload,
        }
    }
}

/// Port for logging activity events to a structured log.
///
/// The `log` method is synchronous and non-fallible so that logging never
/// disrupts a behavior; failures are dropped.
pub trait ActivityLogger: Send + Sync {
    /// Record an activity event.
    fn log(&self, event: ActivityEvent);
}

/// No-op implementation for tests and when logging is disabled.
pub struct NoActivityLogger;

impl ActivityLogger for NoActivityLogger {
    fn log(&self, _event: ActivityEvent) {}
}
