//! Behavior parameters: what the behaviors gather and how they move.
//!
//! [`BehaviorParams`] tunes the Behavior Executor, [`WatchdogParams`] the
//! stall watchdog running during long collection loops.

use blockhand_domain::ResourceTag;
use std::time::Duration;

/// Literal chat token a delivering agent broadcasts once its items are on
/// the ground.
pub const DEFAULT_HANDOFF_TOKEN: &str = "#handoff-ready";

/// Chat token a delivering agent broadcasts when it holds nothing to throw.
pub const HANDOFF_EMPTY_TOKEN: &str = "#handoff-empty";

/// Static parameters for the behavior executor.
#[derive(Debug, Clone)]
pub struct BehaviorParams {
    /// Resource gathered by Harvest and consumed by Build.
    pub resource: ResourceTag,
    /// Plural name used in chat narration ("logs").
    pub resource_label: String,
    /// Block that must be near a source for it to count as live.
    pub marker: ResourceTag,
    /// Search radius for harvest sources.
    pub search_radius: u32,
    /// Radius around a source in which a marker must exist.
    pub marker_radius: u32,
    /// Narrate harvest progress every N collected blocks.
    pub progress_every: u32,
    /// Distance kept from the requester while following.
    pub follow_distance: f64,
    /// How often the pursuit goal is refreshed.
    pub follow_interval: Duration,
    /// Distance from the requester when delivering.
    pub deliver_distance: f64,
    /// Height above the requester's feet to aim throws at.
    pub aim_height: f64,
    /// Pause between two thrown units.
    pub throw_delay: Duration,
    /// Airtime before placing under the agent's own feet.
    pub jump_delay: Duration,
    /// Distance along +x between the requester and the platform corner.
    pub platform_offset: i32,
    /// Chat token broadcast after a delivery.
    pub handoff_token: String,
}

impl Default for BehaviorParams {
    fn default() -> Self {
        Self {
            resource: ResourceTag::new("oak_log"),
            resource_label: "logs".to_string(),
            marker: ResourceTag::new("oak_leaves"),
            search_radius: 64,
            marker_radius: 3,
            progress_every: 5,
            follow_distance: 2.0,
            follow_interval: Duration::from_millis(1000),
            deliver_distance: 2.0,
            aim_height: 1.0,
            throw_delay: Duration::from_millis(250),
            jump_delay: Duration::from_millis(300),
            platform_offset: 2,
            handoff_token: DEFAULT_HANDOFF_TOKEN.to_string(),
        }
    }
}

impl BehaviorParams {
    // ==================== Builder Methods ====================

    pub fn with_resource(
        mut self,
        resource: impl Into<ResourceTag>,
        label: impl Into<String>,
    ) -> Self {
        self.resource = resource.into();
        self.resource_label = label.into();
        self
    }

    pub fn with_marker(mut self, marker: impl Into<ResourceTag>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_search_radius(mut self, radius: u32) -> Self {
        self.search_radius = radius;
        self
    }

    pub fn with_follow_interval(mut self, interval: Duration) -> Self {
        self.follow_interval = interval;
        self
    }

    pub fn with_handoff_token(mut self, token: impl Into<String>) -> Self {
        self.handoff_token = token.into();
        self
    }
}

/// Stall watchdog tuning.
#[derive(Debug, Clone)]
pub struct WatchdogParams {
    /// Sampling period.
    pub tick: Duration,
    /// Displacement below which a sample counts as stalled.
    pub epsilon: f64,
    /// Consecutive stalled samples that make a stall.
    pub threshold: u32,
    /// Ticks to wait after a recovery before sampling resumes.
    pub recovery_ticks: u32,
}

impl Default for WatchdogParams {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(500),
            epsilon: 0.05,
            threshold: 6,
            recovery_ticks: 2,
        }
    }
}

impl WatchdogParams {
    /// Pause applied after a recovery.
    pub fn recovery_pause(&self) -> Duration {
        self.tick * self.recovery_ticks
    }
}
