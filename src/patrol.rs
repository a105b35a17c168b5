use crate::config::PatrolConfig;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Periodic, change-independent capture cadence.
///
/// Purely a timer: the capture/submit/publish work on fire belongs to the
/// caller. Firing resets `last_fire` to the supplied `now`; drift is not
/// compensated and missed intervals are not backfilled.
pub struct PatrolScheduler {
    enabled: bool,
    interval: Duration,
    last_fire: Option<Instant>,
}

impl PatrolScheduler {
    pub fn new(config: &PatrolConfig) -> Self {
        Self {
            enabled: config.enabled,
            interval: Duration::from_secs(config.interval_secs),
            last_fire: None,
        }
    }

    /// Advance the schedule; returns true when a patrol capture is due
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }

        let due = match self.last_fire {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };

        if due {
            self.last_fire = Some(now);
            debug!("Patrol fire");
        }
        due
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            info!("Patrol {}", if enabled { "started" } else { "stopped" });
        }
        self.enabled = enabled;
        if !enabled {
            self.last_fire = None;
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, interval_secs: u64) -> PatrolConfig {
        PatrolConfig {
            enabled,
            interval_secs,
            submit_to_ai: true,
        }
    }

    #[test]
    fn test_disabled_never_fires() {
        let mut patrol = PatrolScheduler::new(&config(false, 1));
        let now = Instant::now();
        assert!(!patrol.tick(now));
        assert!(!patrol.tick(now + Duration::from_secs(100)));
    }

    #[test]
    fn test_fires_immediately_then_on_interval() {
        let mut patrol = PatrolScheduler::new(&config(true, 30));
        let start = Instant::now();

        assert!(patrol.tick(start));
        assert!(!patrol.tick(start + Duration::from_secs(29)));
        assert!(patrol.tick(start + Duration::from_secs(30)));
        assert!(!patrol.tick(start + Duration::from_secs(31)));
    }

    #[test]
    fn test_no_backfill_after_missed_intervals() {
        let mut patrol = PatrolScheduler::new(&config(true, 30));
        let start = Instant::now();
        assert!(patrol.tick(start));

        // Three intervals elapse unobserved; only one fire results and the
        // schedule restarts from that observation
        let late = start + Duration::from_secs(95);
        assert!(patrol.tick(late));
        assert!(!patrol.tick(late + Duration::from_secs(1)));
        assert!(patrol.tick(late + Duration::from_secs(30)));
    }

    #[test]
    fn test_toggle_resets_schedule() {
        let mut patrol = PatrolScheduler::new(&config(true, 30));
        let start = Instant::now();
        assert!(patrol.tick(start));

        patrol.set_enabled(false);
        assert!(!patrol.tick(start + Duration::from_secs(60)));

        // Re-enabling fires on the next tick
        patrol.set_enabled(true);
        assert!(patrol.tick(start + Duration::from_secs(61)));
    }
}
