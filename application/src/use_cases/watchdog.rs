//! Stall watchdog.
//!
//! Pathing can wedge an agent against terrain without ever reporting an
//! error. The watchdog samples the agent's position on a fixed tick and,
//! when it stops moving for long enough, halts movement and clears control
//! states so the running behavior's next path request starts clean.

use crate::config::WatchdogParams;
use crate::ports::world::WorldPort;
use crate::use_cases::periodic::PeriodicTask;
use blockhand_domain::Position;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pure stall detection over a stream of position samples.
#[derive(Debug, Clone)]
pub struct StallDetector {
    epsilon: f64,
    threshold: u32,
    last: Option<Position>,
    still: u32,
    tripped: bool,
}

impl StallDetector {
    pub fn new(epsilon: f64, threshold: u32) -> Self {
        Self {
            epsilon,
            threshold: threshold.max(1),
            last: None,
            still: 0,
            tripped: false,
        }
    }

    /// Feed one sample. Returns `true` when a recovery should run.
    ///
    /// Fires once per contiguous stall episode; any real movement ends the
    /// episode.
    pub fn observe(&mut self, position: Position) -> bool {
        let Some(last) = self.last.replace(position) else {
            return false;
        };

        if last.distance_to(&position) >= self.epsilon {
            self.still = 0;
            self.tripped = false;
            return false;
        }

        self.still += 1;
        if self.still >= self.threshold && !self.tripped {
            self.tripped = true;
            self.still = 0;
            return true;
        }
        false
    }

    /// Consecutive still samples seen so far.
    pub fn still_count(&self) -> u32 {
        self.still
    }
}

/// Periodic stall recovery bound to one agent body.
pub struct StallWatchdog;

impl StallWatchdog {
    /// Start watching. The returned handle stops the watchdog when dropped.
    pub fn spawn(world: Arc<dyn WorldPort>, params: &WatchdogParams) -> PeriodicTask {
        let mut detector = StallDetector::new(params.epsilon, params.threshold);
        let pause = params.recovery_pause();

        PeriodicTask::spawn(params.tick, move || {
            let world = world.clone();
            let stalled = match world.position() {
                Ok(position) => detector.observe(position),
                Err(e) => {
                    debug!("Watchdog skipped a sample: {}", e);
                    false
                }
            };

            async move {
                if stalled {
                    warn!("{} appears stuck, resetting movement", world.username());
                    world.stop_movement();
                    world.clear_control_states();
                    tokio::time::sleep(pause).await;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64) -> Position {
        Position::new(x, 64.0, 0.0)
    }

    #[test]
    fn test_no_recovery_while_moving() {
        let mut detector = StallDetector::new(0.05, 3);
        for i in 0..50 {
            assert!(!detector.observe(at(i as f64 * 0.5)));
        }
    }

    #[test]
    fn test_recovery_fires_once_per_episode() {
        let mut detector = StallDetector::new(0.05, 3);
        let fired: Vec<bool> = (0..12).map(|_| detector.observe(at(1.0))).collect();
        assert_eq!(fired.iter().filter(|f| **f).count(), 1);
        assert!(fired[3]);
    }

    #[test]
    fn test_movement_starts_a_new_episode() {
        let mut detector = StallDetector::new(0.05, 2);
        detector.observe(at(0.0));
        detector.observe(at(0.0));
        assert!(detector.observe(at(0.0)));

        // Moves, then stalls again
        assert!(!detector.observe(at(2.0)));
        assert_eq!(detector.still_count(), 0);
        assert!(!detector.observe(at(2.0)));
        assert!(detector.observe(at(2.0)));
    }

    #[test]
    fn test_sub_epsilon_jitter_counts_as_still() {
        let mut detector = StallDetector::new(0.05, 2);
        detector.observe(at(0.0));
        assert!(!detector.observe(at(0.01)));
        assert!(detector.observe(at(0.02)));
    }
}
