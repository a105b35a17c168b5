use crate::config::DetectorConfig;
use crate::frame::FrameBuffer;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Outcome of one change evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeResult {
    pub detected: bool,
    pub changed_units: u32,
    pub percent: f32,
}

impl ChangeResult {
    fn none() -> Self {
        Self {
            detected: false,
            changed_units: 0,
            percent: 0.0,
        }
    }
}

/// Counters mutated only by the detector's evaluation step
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionState {
    pub last_event: Option<Instant>,
    pub event_count: u64,
    pub consecutive_count: u32,
}

/// Frame-difference change detector.
///
/// Compares the incoming frame to a retained baseline at a fixed byte
/// stride. This operates on the compressed byte stream, not decoded
/// pixels: a cheap change proxy, not per-pixel motion analysis. After a
/// comparison the baseline always becomes the new frame, so each cycle
/// compares against the immediately preceding frame rather than a
/// long-term reference.
pub struct ChangeDetector {
    config: DetectorConfig,
    baseline: Option<Vec<u8>>,
    state: MotionState,
}

impl ChangeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            baseline: None,
            state: MotionState::default(),
        }
    }

    /// Evaluate one frame against the baseline.
    ///
    /// Inside the cooldown window this short-circuits without comparing:
    /// the cooldown bounds event-publish frequency, it does not count as a
    /// non-detecting cycle, so neither the counters nor the baseline move.
    /// A baseline length mismatch reseeds the baseline and skips the
    /// comparison, also without touching the counters.
    pub fn evaluate(&mut self, frame: &FrameBuffer, now: Instant) -> ChangeResult {
        if self.in_cooldown(now) {
            trace!("Change evaluation suppressed by cooldown");
            return ChangeResult::none();
        }

        let baseline = match self.baseline.as_ref() {
            None => {
                debug!("Seeding baseline with first frame ({} bytes)", frame.len());
                self.baseline = Some(frame.data.to_vec());
                return ChangeResult::none();
            }
            Some(baseline) if baseline.len() != frame.len() => {
                debug!(
                    "Baseline length {} != frame length {}, reseeding",
                    baseline.len(),
                    frame.len()
                );
                self.baseline = Some(frame.data.to_vec());
                return ChangeResult::none();
            }
            Some(baseline) => baseline,
        };

        let stride = self.config.sample_stride;
        let threshold = self.config.byte_threshold as i16;

        let mut changed_units = 0u32;
        let mut total_units = 0u32;
        let mut i = 0;
        while i < frame.len() {
            total_units += 1;
            let diff = (frame.data[i] as i16 - baseline[i] as i16).abs();
            if diff > threshold {
                changed_units += 1;
            }
            i += stride;
        }

        let percent = if total_units > 0 {
            changed_units as f32 / total_units as f32 * 100.0
        } else {
            0.0
        };
        let detected = changed_units > self.config.min_area_units;

        // Baseline always becomes the frame just seen, detected or not
        self.baseline = Some(frame.data.to_vec());

        if detected {
            self.state.last_event = Some(now);
            self.state.event_count += 1;
            self.state.consecutive_count += 1;
            debug!(
                "Change detected: {}/{} units ({:.1}%), consecutive {}",
                changed_units, total_units, percent, self.state.consecutive_count
            );
        } else {
            self.state.consecutive_count = 0;
            trace!(
                "No change: {}/{} units ({:.1}%)",
                changed_units,
                total_units,
                percent
            );
        }

        ChangeResult {
            detected,
            changed_units,
            percent,
        }
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        if self.config.cooldown_ms == 0 {
            return false;
        }
        match self.state.last_event {
            Some(last) => {
                now.saturating_duration_since(last) < Duration::from_millis(self.config.cooldown_ms)
            }
            None => false,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn consecutive_count(&self) -> u32 {
        self.state.consecutive_count
    }

    pub fn event_count(&self) -> u64 {
        self.state.event_count
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config(cooldown_ms: u64) -> DetectorConfig {
        DetectorConfig {
            byte_threshold: 20,
            sample_stride: 10,
            min_area_units: 5,
            cooldown_ms,
        }
    }

    fn frame(fill: u8, len: usize) -> FrameBuffer {
        FrameBuffer::new(0, Utc::now(), vec![fill; len], 640, 480)
    }

    #[test]
    fn test_first_frame_seeds_baseline() {
        let mut detector = ChangeDetector::new(config(0));
        let result = detector.evaluate(&frame(100, 1000), Instant::now());

        assert!(!result.detected);
        assert!(detector.has_baseline());
        assert_eq!(detector.consecutive_count(), 0);
        assert_eq!(detector.event_count(), 0);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let now = Instant::now();

        let mut a = ChangeDetector::new(config(0));
        a.evaluate(&frame(100, 1000), now);
        let first = a.evaluate(&frame(160, 1000), now);

        let mut b = ChangeDetector::new(config(0));
        b.evaluate(&frame(100, 1000), now);
        let second = b.evaluate(&frame(160, 1000), now);

        assert_eq!(first, second);
        assert!(first.detected);
        // 1000 bytes at stride 10 = 100 sampled units, all changed by 60
        assert_eq!(first.changed_units, 100);
        assert!((first.percent - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_small_delta_is_not_detected() {
        let mut detector = ChangeDetector::new(config(0));
        let now = Instant::now();
        detector.evaluate(&frame(100, 1000), now);

        // Per-byte delta of 10 stays under the threshold of 20
        let result = detector.evaluate(&frame(110, 1000), now);
        assert!(!result.detected);
        assert_eq!(result.changed_units, 0);
    }

    #[test]
    fn test_consecutive_count_accounting() {
        let mut detector = ChangeDetector::new(config(0));
        let now = Instant::now();
        detector.evaluate(&frame(0, 1000), now);

        detector.evaluate(&frame(60, 1000), now);
        assert_eq!(detector.consecutive_count(), 1);
        detector.evaluate(&frame(120, 1000), now);
        assert_eq!(detector.consecutive_count(), 2);

        // Identical frame resets the run
        detector.evaluate(&frame(120, 1000), now);
        assert_eq!(detector.consecutive_count(), 0);
        assert_eq!(detector.event_count(), 2);

        detector.evaluate(&frame(180, 1000), now);
        assert_eq!(detector.consecutive_count(), 1);
    }

    #[test]
    fn test_cooldown_suppresses_second_detection() {
        let mut detector = ChangeDetector::new(config(1000));
        let start = Instant::now();
        detector.evaluate(&frame(0, 1000), start);

        let first = detector.evaluate(&frame(60, 1000), start);
        assert!(first.detected);
        assert_eq!(detector.consecutive_count(), 1);

        // Well inside the cooldown window the delta would qualify, but the
        // evaluation short-circuits without comparing
        let inside = detector.evaluate(&frame(120, 1000), start + Duration::from_millis(100));
        assert!(!inside.detected);
        assert_eq!(inside.changed_units, 0);
        assert_eq!(detector.consecutive_count(), 1);

        // After the window the same delta is detected again
        let after = detector.evaluate(&frame(120, 1000), start + Duration::from_millis(1100));
        assert!(after.detected);
        assert_eq!(detector.consecutive_count(), 2);
    }

    #[test]
    fn test_length_mismatch_reseeds_without_touching_counters() {
        let mut detector = ChangeDetector::new(config(0));
        let now = Instant::now();
        detector.evaluate(&frame(0, 1000), now);
        detector.evaluate(&frame(60, 1000), now);
        assert_eq!(detector.consecutive_count(), 1);

        // Different length: reseed, no comparison, counters untouched
        let mismatch = detector.evaluate(&frame(200, 900), now);
        assert!(!mismatch.detected);
        assert_eq!(mismatch.changed_units, 0);
        assert_eq!(detector.consecutive_count(), 1);
        assert_eq!(detector.event_count(), 1);

        // The reseeded baseline is the 900-byte frame
        let next = detector.evaluate(&frame(140, 900), now);
        assert!(next.detected);
        assert_eq!(detector.consecutive_count(), 2);
    }

    #[test]
    fn test_baseline_replaced_even_without_detection() {
        let mut detector = ChangeDetector::new(config(0));
        let now = Instant::now();
        detector.evaluate(&frame(100, 1000), now);

        // Two sub-threshold steps of 15; against a long-term reference the
        // second frame would differ by 30 from the first, but each cycle
        // compares against the immediately preceding frame
        assert!(!detector.evaluate(&frame(115, 1000), now).detected);
        assert!(!detector.evaluate(&frame(130, 1000), now).detected);
    }
}
