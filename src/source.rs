use crate::frame::{ExposureProfile, FrameBuffer};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::debug;

/// The frame capture collaborator.
///
/// Frames are single-owner, single-use: acquired with `capture_frame`,
/// processed for one cycle, then handed back with `release_frame`. The
/// core never retains one past its cycle except as the detector's baseline
/// copy of the bytes.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Capture a frame, or `None` when the hardware has nothing to give
    async fn capture_frame(&self) -> Option<FrameBuffer>;

    /// Return a frame buffer to the source
    async fn release_frame(&self, frame: FrameBuffer);

    /// Drive supplemental illumination (0 = off, 255 = full)
    async fn set_illumination(&self, level: u8);

    /// Request a capture-parameter regime (gain, exposure)
    async fn set_exposure_profile(&self, profile: ExposureProfile);
}

struct SyntheticInner {
    next_id: u64,
    frame_len: usize,
    fill: u8,
    queued: VecDeque<Vec<u8>>,
    fail_captures: bool,
    captures: u64,
    releases: u64,
    illumination: u8,
    illumination_calls: Vec<u8>,
    profile: ExposureProfile,
    profile_calls: Vec<ExposureProfile>,
}

/// In-process frame source for tests and the demo binary.
///
/// Frames come from an explicit queue when one has been pushed, otherwise
/// from a deterministic generator filling the buffer with a constant byte.
/// Every collaborator call is recorded so tests can assert on capture,
/// release and illumination behavior.
pub struct SyntheticFrameSource {
    inner: Mutex<SyntheticInner>,
    width: u32,
    height: u32,
}

impl SyntheticFrameSource {
    pub fn new(frame_len: usize, width: u32, height: u32) -> Self {
        Self {
            inner: Mutex::new(SyntheticInner {
                next_id: 1,
                frame_len,
                fill: 128,
                queued: VecDeque::new(),
                fail_captures: false,
                captures: 0,
                releases: 0,
                illumination: 0,
                illumination_calls: Vec::new(),
                profile: ExposureProfile::Day,
                profile_calls: Vec::new(),
            }),
            width,
            height,
        }
    }

    /// Queue exact frame bytes for the next captures (FIFO)
    pub fn push_frame(&self, data: Vec<u8>) {
        self.inner.lock().queued.push_back(data);
    }

    /// Set the fill byte used by the generator when the queue is empty
    pub fn set_fill(&self, fill: u8) {
        self.inner.lock().fill = fill;
    }

    /// Make subsequent captures return `None`
    pub fn set_fail_captures(&self, fail: bool) {
        self.inner.lock().fail_captures = fail;
    }

    pub fn captures(&self) -> u64 {
        self.inner.lock().captures
    }

    pub fn releases(&self) -> u64 {
        self.inner.lock().releases
    }

    pub fn illumination(&self) -> u8 {
        self.inner.lock().illumination
    }

    pub fn illumination_calls(&self) -> Vec<u8> {
        self.inner.lock().illumination_calls.clone()
    }

    pub fn profile(&self) -> ExposureProfile {
        self.inner.lock().profile
    }

    pub fn profile_calls(&self) -> Vec<ExposureProfile> {
        self.inner.lock().profile_calls.clone()
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn capture_frame(&self) -> Option<FrameBuffer> {
        let mut inner = self.inner.lock();
        if inner.fail_captures {
            debug!("Synthetic capture failure");
            return None;
        }

        let data = inner
            .queued
            .pop_front()
            .unwrap_or_else(|| vec![inner.fill; inner.frame_len]);

        let id = inner.next_id;
        inner.next_id += 1;
        inner.captures += 1;

        Some(FrameBuffer::new(id, Utc::now(), data, self.width, self.height))
    }

    async fn release_frame(&self, frame: FrameBuffer) {
        let mut inner = self.inner.lock();
        inner.releases += 1;
        debug!("Released frame {}", frame.id);
    }

    async fn set_illumination(&self, level: u8) {
        let mut inner = self.inner.lock();
        inner.illumination = level;
        inner.illumination_calls.push(level);
    }

    async fn set_exposure_profile(&self, profile: ExposureProfile) {
        let mut inner = self.inner.lock();
        inner.profile = profile;
        inner.profile_calls.push(profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_source_generates_and_queues() {
        let source = SyntheticFrameSource::new(100, 640, 480);

        let generated = source.capture_frame().await.unwrap();
        assert_eq!(generated.len(), 100);
        assert_eq!(generated.data[0], 128);

        source.push_frame(vec![7u8; 40]);
        let queued = source.capture_frame().await.unwrap();
        assert_eq!(queued.len(), 40);
        assert_eq!(queued.data[0], 7);

        assert_eq!(source.captures(), 2);

        source.release_frame(generated).await;
        source.release_frame(queued).await;
        assert_eq!(source.releases(), 2);
    }

    #[tokio::test]
    async fn test_capture_failure_mode() {
        let source = SyntheticFrameSource::new(100, 640, 480);
        source.set_fail_captures(true);
        assert!(source.capture_frame().await.is_none());
        assert_eq!(source.captures(), 0);

        source.set_fail_captures(false);
        assert!(source.capture_frame().await.is_some());
    }

    #[tokio::test]
    async fn test_illumination_and_profile_recording() {
        let source = SyntheticFrameSource::new(100, 640, 480);
        source.set_illumination(255).await;
        source.set_illumination(0).await;
        source.set_exposure_profile(ExposureProfile::Night).await;

        assert_eq!(source.illumination(), 0);
        assert_eq!(source.illumination_calls(), vec![255, 0]);
        assert_eq!(source.profile(), ExposureProfile::Night);
    }
}
