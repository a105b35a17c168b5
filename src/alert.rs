use crate::config::{AlertConfig, MessagingConfig};
use crate::events::{EventBus, SentrycamEvent};
use crate::frame::CaptureContext;
use crate::net::{Classifier, Publisher};
use crate::source::FrameSource;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Escalation state. `Escalating` is not a distinct state: it is `Idle`
/// with a nonzero consecutive count in the change detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    Idle,
    Alerting,
}

/// Why the alert fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertReason {
    /// Sustained local change detection
    Motion,
    /// Remote classification reported a person
    Person,
}

impl AlertReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertReason::Motion => "motion",
            AlertReason::Person => "person_detected",
        }
    }
}

/// The alert escalation state machine.
///
/// `trigger` flips an atomic guard with compare-exchange; exactly one
/// caller wins while an alert is active, whether the trigger came from the
/// sensing loop or from a network-callback fusion ingest. The winner
/// spawns the evidence sequence as an independent task so the cooperative
/// loop keeps running; the task clears the guard on completion, returning
/// the machine to `Idle` unconditionally.
pub struct AlertEscalator {
    config: AlertConfig,
    messaging: MessagingConfig,
    source: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    publisher: Arc<dyn Publisher>,
    bus: EventBus,
    active: Arc<AtomicBool>,
    alerts_fired: Arc<AtomicU64>,
}

impl AlertEscalator {
    pub fn new(
        config: AlertConfig,
        messaging: MessagingConfig,
        source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        publisher: Arc<dyn Publisher>,
        bus: EventBus,
    ) -> Self {
        Self {
            config,
            messaging,
            source,
            classifier,
            publisher,
            bus,
            active: Arc::new(AtomicBool::new(false)),
            alerts_fired: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn state(&self) -> AlertState {
        if self.active.load(Ordering::SeqCst) {
            AlertState::Alerting
        } else {
            AlertState::Idle
        }
    }

    /// Total alerts entered since startup
    pub fn alerts_fired(&self) -> u64 {
        self.alerts_fired.load(Ordering::SeqCst)
    }

    /// Attempt the `Idle -> Alerting` transition.
    ///
    /// Returns the handle of the spawned evidence task when the trigger
    /// won the guard, `None` when an alert is already active.
    pub fn trigger(&self, reason: AlertReason, night: bool) -> Option<JoinHandle<()>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(
                "Alert trigger ({}) ignored: already alerting",
                reason.as_str()
            );
            return None;
        }

        self.alerts_fired.fetch_add(1, Ordering::SeqCst);
        info!("Entering alert state: {} (night: {})", reason.as_str(), night);

        let config = self.config.clone();
        let messaging = self.messaging.clone();
        let source = Arc::clone(&self.source);
        let classifier = Arc::clone(&self.classifier);
        let publisher = Arc::clone(&self.publisher);
        let bus = self.bus.clone();
        let active = Arc::clone(&self.active);

        Some(tokio::spawn(async move {
            run_sequence(
                &config, &messaging, &*source, &*classifier, &*publisher, &bus, reason, night,
            )
            .await;
            active.store(false, Ordering::SeqCst);
            info!("Alert sequence complete, returning to idle");
        }))
    }
}

/// The evidence sequence run once per alert entry.
///
/// A failed capture is skipped, not retried; a failed upload is logged and
/// the remaining evidence frames still run.
#[allow(clippy::too_many_arguments)]
async fn run_sequence(
    config: &AlertConfig,
    messaging: &MessagingConfig,
    source: &dyn FrameSource,
    classifier: &dyn Classifier,
    publisher: &dyn Publisher,
    bus: &EventBus,
    reason: AlertReason,
    night: bool,
) {
    // 1. Retained alert notification
    let event = SentrycamEvent::IntruderAlert {
        reason: reason.as_str().to_string(),
        timestamp: Utc::now(),
        night,
    };
    if let Err(e) = bus.publish(event.clone()).await {
        error!("Failed to publish alert on bus: {}", e);
    }
    if let Some(topic) = event.topic(&messaging.topic_prefix) {
        if let Err(e) = publisher.publish(&topic, event.payload(), event.retain()).await {
            error!("Failed to publish retained alert: {}", e);
        }
    }

    // 2. Visual deterrent pattern
    for _ in 0..config.deterrent_cycles {
        source.set_illumination(config.illumination_level).await;
        tokio::time::sleep(Duration::from_millis(config.deterrent_pulse_ms)).await;
        source.set_illumination(0).await;
        tokio::time::sleep(Duration::from_millis(config.deterrent_pulse_ms)).await;
    }

    // 3. Evidence captures
    for i in 0..config.evidence_frames {
        if night {
            source.set_illumination(config.illumination_level).await;
            tokio::time::sleep(Duration::from_millis(config.settle_ms)).await;
        }

        match source.capture_frame().await {
            Some(frame) => {
                debug!(
                    "Evidence capture {}/{}: frame {} ({} bytes)",
                    i + 1,
                    config.evidence_frames,
                    frame.id,
                    frame.len()
                );
                if let Err(e) = classifier
                    .submit(&frame, CaptureContext::IntruderEvidence)
                    .await
                {
                    warn!("Evidence upload {}/{} failed: {}", i + 1, config.evidence_frames, e);
                }
                source.release_frame(frame).await;
            }
            None => {
                warn!(
                    "Evidence capture {}/{} failed, skipping",
                    i + 1,
                    config.evidence_frames
                );
            }
        }

        if night {
            source.set_illumination(0).await;
        }

        if i + 1 < config.evidence_frames {
            tokio::time::sleep(Duration::from_millis(config.evidence_gap_ms)).await;
        }
    }

    // 4. Unconditional return to idle happens in the caller's cleanup
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::{MemoryPublisher, StaticClassifier};
    use crate::source::SyntheticFrameSource;

    fn config(evidence_frames: u32) -> AlertConfig {
        AlertConfig {
            trigger_frames: 3,
            evidence_frames,
            evidence_gap_ms: 0,
            settle_ms: 0,
            deterrent_cycles: 2,
            deterrent_pulse_ms: 0,
            illumination_level: 255,
        }
    }

    fn messaging() -> MessagingConfig {
        MessagingConfig {
            topic_prefix: "sentrycam/".to_string(),
            device_id: "sentrycam-01".to_string(),
        }
    }

    fn escalator(
        evidence_frames: u32,
    ) -> (
        AlertEscalator,
        Arc<SyntheticFrameSource>,
        Arc<StaticClassifier>,
        Arc<MemoryPublisher>,
    ) {
        let source = Arc::new(SyntheticFrameSource::new(1000, 640, 480));
        let classifier = Arc::new(StaticClassifier::new());
        let publisher = Arc::new(MemoryPublisher::new());
        let escalator = AlertEscalator::new(
            config(evidence_frames),
            messaging(),
            Arc::clone(&source) as Arc<dyn FrameSource>,
            Arc::clone(&classifier) as Arc<dyn Classifier>,
            Arc::clone(&publisher) as Arc<dyn Publisher>,
            EventBus::new(16),
        );
        (escalator, source, classifier, publisher)
    }

    #[tokio::test]
    async fn test_full_sequence_night() {
        let (escalator, source, classifier, publisher) = escalator(3);

        let handle = escalator.trigger(AlertReason::Motion, true).unwrap();
        handle.await.unwrap();

        // One retained alert publish
        let alerts = publisher.messages_for("sentrycam/camera/alert");
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].retain);
        assert_eq!(alerts[0].payload["reason"], "motion");
        assert_eq!(alerts[0].payload["night"], true);

        // Three evidence frames captured, submitted and released
        assert_eq!(source.captures(), 3);
        assert_eq!(source.releases(), 3);
        let subs = classifier.submissions();
        assert_eq!(subs.len(), 3);
        assert!(subs
            .iter()
            .all(|s| s.context == CaptureContext::IntruderEvidence));

        // Deterrent (2 on/off cycles) plus per-frame illumination at night
        let calls = source.illumination_calls();
        assert_eq!(calls.len(), 4 + 6);
        assert_eq!(source.illumination(), 0);

        assert_eq!(escalator.state(), AlertState::Idle);
        assert_eq!(escalator.alerts_fired(), 1);
    }

    #[tokio::test]
    async fn test_day_sequence_skips_evidence_illumination() {
        let (escalator, source, _classifier, _publisher) = escalator(2);

        let handle = escalator.trigger(AlertReason::Person, false).unwrap();
        handle.await.unwrap();

        // Only the deterrent pattern touches illumination
        assert_eq!(source.illumination_calls().len(), 4);
        assert_eq!(source.captures(), 2);
    }

    #[tokio::test]
    async fn test_at_most_one_active_alert() {
        let (escalator, _source, _classifier, publisher) = escalator(2);

        let handle = escalator.trigger(AlertReason::Motion, false).unwrap();
        // The guard is taken synchronously, so a second trigger from either
        // path loses before the sequence has even started running
        assert!(escalator.trigger(AlertReason::Person, false).is_none());
        assert!(escalator.trigger(AlertReason::Motion, false).is_none());
        assert_eq!(escalator.state(), AlertState::Alerting);

        handle.await.unwrap();
        assert_eq!(escalator.state(), AlertState::Idle);
        assert_eq!(publisher.messages_for("sentrycam/camera/alert").len(), 1);
        assert_eq!(escalator.alerts_fired(), 1);

        // Back in idle the machine accepts a fresh trigger
        let handle = escalator.trigger(AlertReason::Motion, false).unwrap();
        handle.await.unwrap();
        assert_eq!(escalator.alerts_fired(), 2);
    }

    #[tokio::test]
    async fn test_capture_failure_skips_without_abort() {
        let (escalator, source, classifier, publisher) = escalator(3);
        source.set_fail_captures(true);

        let handle = escalator.trigger(AlertReason::Motion, true).unwrap();
        handle.await.unwrap();

        // Alert still published, nothing submitted, machine back to idle
        assert_eq!(publisher.messages_for("sentrycam/camera/alert").len(), 1);
        assert_eq!(classifier.submission_count(), 0);
        assert_eq!(source.releases(), 0);
        assert_eq!(escalator.state(), AlertState::Idle);
    }

    #[tokio::test]
    async fn test_upload_failure_does_not_abort_sequence() {
        let (escalator, source, classifier, _publisher) = escalator(3);
        classifier.set_fail(true);

        let handle = escalator.trigger(AlertReason::Motion, false).unwrap();
        handle.await.unwrap();

        // Every evidence frame is still attempted and released
        assert_eq!(classifier.submission_count(), 3);
        assert_eq!(source.captures(), 3);
        assert_eq!(source.releases(), 3);
        assert_eq!(escalator.state(), AlertState::Idle);
    }
}
