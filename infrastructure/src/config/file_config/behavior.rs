//! Behavior tuning from TOML (`[behavior]` and `[watchdog]` sections)

use super::positive_or;
use blockhand_application::config::{BehaviorParams, DEFAULT_HANDOFF_TOKEN, WatchdogParams};
use blockhand_domain::{ConfigIssue, ResourceTag};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw behavior configuration from TOML
///
/// # Example
///
/// ```toml
/// [behavior]
/// resource = "oak_log"
/// resource_label = "logs"
/// marker = "oak_leaves"     # a source only counts if a marker is nearby
/// search_radius = 64
/// follow_interval_ms = 1000
/// throw_delay_ms = 250
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBehaviorConfig {
    pub resource: String,
    /// Plural used in narration ("9 logs")
    pub resource_label: String,
    pub marker: String,
    pub search_radius: u32,
    pub marker_radius: u32,
    /// Narrate harvest progress every N blocks
    pub progress_every: u32,
    pub follow_distance: f64,
    pub follow_interval_ms: u64,
    pub deliver_distance: f64,
    pub aim_height: f64,
    pub throw_delay_ms: u64,
    pub jump_delay_ms: u64,
    /// Blocks between the requester and the platform's near edge
    pub platform_offset: i32,
    pub handoff_token: String,
}

impl Default for FileBehaviorConfig {
    fn default() -> Self {
        let params = BehaviorParams::default();
        Self {
            resource: params.resource.to_string(),
            resource_label: params.resource_label,
            marker: params.marker.to_string(),
            search_radius: params.search_radius,
            marker_radius: params.marker_radius,
            progress_every: params.progress_every,
            follow_distance: params.follow_distance,
            follow_interval_ms: params.follow_interval.as_millis() as u64,
            deliver_distance: params.deliver_distance,
            aim_height: params.aim_height,
            throw_delay_ms: params.throw_delay.as_millis() as u64,
            jump_delay_ms: params.jump_delay.as_millis() as u64,
            platform_offset: params.platform_offset,
            handoff_token: DEFAULT_HANDOFF_TOKEN.to_string(),
        }
    }
}

impl FileBehaviorConfig {
    /// Convert to [`BehaviorParams`], replacing out-of-range values with
    /// their defaults and reporting each replacement.
    pub fn to_behavior_params(&self) -> (BehaviorParams, Vec<ConfigIssue>) {
        let defaults = BehaviorParams::default();
        let mut issues = Vec::new();

        if self.resource.trim().is_empty() {
            issues.push(ConfigIssue::empty("behavior.resource"));
        }
        if self.handoff_token.trim().is_empty() {
            issues.push(ConfigIssue::empty("behavior.handoff_token"));
        }

        let params = BehaviorParams {
            resource: ResourceTag::new(self.resource.trim()),
            resource_label: self.resource_label.clone(),
            marker: ResourceTag::new(self.marker.trim()),
            search_radius: positive_or(
                "behavior.search_radius",
                self.search_radius,
                defaults.search_radius,
                &mut issues,
            ),
            marker_radius: self.marker_radius,
            progress_every: positive_or(
                "behavior.progress_every",
                self.progress_every,
                defaults.progress_every,
                &mut issues,
            ),
            follow_distance: positive_or(
                "behavior.follow_distance",
                self.follow_distance,
                defaults.follow_distance,
                &mut issues,
            ),
            follow_interval: Duration::from_millis(positive_or(
                "behavior.follow_interval_ms",
                self.follow_interval_ms,
                defaults.follow_interval.as_millis() as u64,
                &mut issues,
            )),
            deliver_distance: positive_or(
                "behavior.deliver_distance",
                self.deliver_distance,
                defaults.deliver_distance,
                &mut issues,
            ),
            aim_height: self.aim_height,
            throw_delay: Duration::from_millis(self.throw_delay_ms),
            jump_delay: Duration::from_millis(self.jump_delay_ms),
            platform_offset: self.platform_offset,
            handoff_token: self.handoff_token.clone(),
        };
        (params, issues)
    }
}

/// Raw stall watchdog configuration from TOML
///
/// ```toml
/// [watchdog]
/// tick_ms = 500
/// epsilon = 0.05
/// threshold = 6
/// recovery_ticks = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWatchdogConfig {
    pub tick_ms: u64,
    /// Minimum displacement that counts as movement
    pub epsilon: f64,
    /// Still samples before a stall is declared
    pub threshold: u32,
    pub recovery_ticks: u32,
}

impl Default for FileWatchdogConfig {
    fn default() -> Self {
        let params = WatchdogParams::default();
        Self {
            tick_ms: params.tick.as_millis() as u64,
            epsilon: params.epsilon,
            threshold: params.threshold,
            recovery_ticks: params.recovery_ticks,
        }
    }
}

impl FileWatchdogConfig {
    pub fn to_watchdog_params(&self) -> (WatchdogParams, Vec<ConfigIssue>) {
        let defaults = WatchdogParams::default();
        let mut issues = Vec::new();
        let params = WatchdogParams {
            tick: Duration::from_millis(positive_or(
                "watchdog.tick_ms",
                self.tick_ms,
                defaults.tick.as_millis() as u64,
                &mut issues,
            )),
            epsilon: positive_or("watchdog.epsilon", self.epsilon, defaults.epsilon, &mut issues),
            threshold: positive_or(
                "watchdog.threshold",
                self.threshold,
                defaults.threshold,
                &mut issues,
            ),
            recovery_ticks: self.recovery_ticks,
        };
        (params, issues)
    }
}
