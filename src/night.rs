use crate::config::AmbientConfig;
use crate::frame::{ExposureProfile, FrameBuffer};
use crate::source::FrameSource;
use tracing::{debug, info};

/// Ambient brightness proxy.
///
/// Averages a fixed number of evenly strided bytes of the compressed
/// stream. An approximation, not a colorimetric measurement.
pub struct AmbientLightEstimator {
    sample_count: usize,
}

impl AmbientLightEstimator {
    pub fn new(sample_count: usize) -> Self {
        Self { sample_count }
    }

    /// Estimate scene brightness on the 0-255 proxy scale
    pub fn estimate(&self, frame: &FrameBuffer) -> u8 {
        if frame.is_empty() || self.sample_count == 0 {
            return 0;
        }

        let stride = std::cmp::max(1, frame.len() / self.sample_count);
        let mut sum = 0u32;
        let mut samples = 0u32;
        let mut i = 0;
        while i < frame.len() && samples < self.sample_count as u32 {
            sum += frame.data[i] as u32;
            samples += 1;
            i += stride;
        }

        (sum / samples) as u8
    }
}

/// Emitted on the cycle where night mode flips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub to_night: bool,
    pub ambient: u8,
}

/// Day/night capture-regime switch.
///
/// A plain threshold comparison with no hysteresis: brightness below the
/// low threshold means night. `update` returns `Some` only on the cycle
/// where the mode flips, and on a flip the controller asks the frame
/// source for the matching exposure profile.
pub struct NightModeController {
    threshold_low: u8,
    active: bool,
    ambient: u8,
}

impl NightModeController {
    pub fn new(config: &AmbientConfig) -> Self {
        Self {
            threshold_low: config.light_threshold_low,
            active: false,
            ambient: 0,
        }
    }

    /// Apply a fresh brightness estimate; drives the frame source on flip
    pub async fn update(&mut self, brightness: u8, source: &dyn FrameSource) -> Option<ModeChange> {
        let change = self.transition(brightness)?;

        let profile = if change.to_night {
            ExposureProfile::Night
        } else {
            ExposureProfile::Day
        };
        info!(
            "Night mode {} at ambient {}",
            if change.to_night { "on" } else { "off" },
            change.ambient
        );
        source.set_exposure_profile(profile).await;

        Some(change)
    }

    /// Pure threshold transition, `Some` only on the flip cycle
    fn transition(&mut self, brightness: u8) -> Option<ModeChange> {
        self.ambient = brightness;
        let should_be_night = brightness < self.threshold_low;
        if should_be_night == self.active {
            debug!(
                "Ambient {} keeps night mode {}",
                brightness,
                if self.active { "on" } else { "off" }
            );
            return None;
        }

        self.active = should_be_night;
        Some(ModeChange {
            to_night: should_be_night,
            ambient: brightness,
        })
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn ambient(&self) -> u8 {
        self.ambient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticFrameSource;
    use chrono::Utc;

    fn config() -> AmbientConfig {
        AmbientConfig {
            sample_count: 64,
            light_threshold_low: 100,
            sample_interval_secs: 5,
        }
    }

    fn frame(fill: u8, len: usize) -> FrameBuffer {
        FrameBuffer::new(0, Utc::now(), vec![fill; len], 640, 480)
    }

    #[test]
    fn test_estimate_uniform_frame() {
        let estimator = AmbientLightEstimator::new(64);
        assert_eq!(estimator.estimate(&frame(130, 4800)), 130);
        assert_eq!(estimator.estimate(&frame(0, 4800)), 0);
        assert_eq!(estimator.estimate(&frame(255, 4800)), 255);
    }

    #[test]
    fn test_estimate_short_frame() {
        // Fewer bytes than sample_count still averages what is there
        let estimator = AmbientLightEstimator::new(64);
        assert_eq!(estimator.estimate(&frame(77, 10)), 77);
        assert_eq!(estimator.estimate(&frame(77, 0)), 0);
    }

    #[test]
    fn test_estimate_mixed_frame() {
        let estimator = AmbientLightEstimator::new(2);
        let mut data = vec![0u8; 100];
        for b in data.iter_mut().skip(50) {
            *b = 200;
        }
        let frame = FrameBuffer::new(0, Utc::now(), data, 640, 480);
        // Two samples at stride 50: bytes 0 and 50 -> (0 + 200) / 2
        assert_eq!(estimator.estimate(&frame), 100);
    }

    #[tokio::test]
    async fn test_flip_only_on_crossing() {
        let source = SyntheticFrameSource::new(100, 640, 480);
        let mut controller = NightModeController::new(&config());

        // Holding on the day side produces nothing
        assert!(controller.update(150, &source).await.is_none());
        assert!(controller.update(100, &source).await.is_none());
        assert!(!controller.active());

        // Crossing below flips exactly once
        let change = controller.update(99, &source).await.unwrap();
        assert!(change.to_night);
        assert_eq!(change.ambient, 99);
        assert!(controller.active());
        assert_eq!(source.profile(), ExposureProfile::Night);

        // Staying dark produces nothing further
        assert!(controller.update(40, &source).await.is_none());

        // Crossing back flips again
        let change = controller.update(100, &source).await.unwrap();
        assert!(!change.to_night);
        assert_eq!(source.profile(), ExposureProfile::Day);
    }

    #[tokio::test]
    async fn test_threshold_boundary_does_not_oscillate() {
        let source = SyntheticFrameSource::new(100, 640, 480);
        let mut controller = NightModeController::new(&config());

        // threshold - 1 is night, threshold is day; holding either value
        // steady never produces a second event
        assert!(controller.update(99, &source).await.is_some());
        assert!(controller.update(99, &source).await.is_none());
        assert!(controller.update(99, &source).await.is_none());

        assert!(controller.update(100, &source).await.is_some());
        assert!(controller.update(100, &source).await.is_none());
        assert_eq!(source.profile_calls().len(), 2);
    }
}
