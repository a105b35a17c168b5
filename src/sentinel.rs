use crate::alert::{AlertEscalator, AlertReason, AlertState};
use crate::config::SentrycamConfig;
use crate::detector::ChangeDetector;
use crate::error::Result;
use crate::events::{EventBus, SentrycamEvent};
use crate::frame::{CaptureContext, FrameBuffer};
use crate::fusion::DetectionFusion;
use crate::net::{Classifier, Publisher};
use crate::night::{AmbientLightEstimator, NightModeController};
use crate::patrol::PatrolScheduler;
use crate::source::FrameSource;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The perimeter-sensing core.
///
/// Owns every mutable component (detector, night controller, patrol
/// schedule, fusion state) and drives them from a single cooperative loop,
/// so none of that state needs locking. The only cross-task shared state
/// is the alert guard inside [`AlertEscalator`] and the collaborator
/// handles.
pub struct PerimeterSentinel {
    config: SentrycamConfig,
    source: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
    publisher: Arc<dyn Publisher>,
    bus: EventBus,
    detector: ChangeDetector,
    estimator: AmbientLightEstimator,
    night: NightModeController,
    escalator: AlertEscalator,
    patrol: PatrolScheduler,
    fusion: DetectionFusion,
    motion_enabled: bool,
    ambient_interval: Duration,
    last_ambient_sample: Option<Instant>,
    started_at: Instant,
}

impl PerimeterSentinel {
    pub fn new(
        config: SentrycamConfig,
        source: Arc<dyn FrameSource>,
        classifier: Arc<dyn Classifier>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let bus = EventBus::new(config.system.event_bus_capacity);
        let escalator = AlertEscalator::new(
            config.alert.clone(),
            config.messaging.clone(),
            source.clone(),
            classifier.clone(),
            publisher.clone(),
            bus.clone(),
        );

        Self {
            detector: ChangeDetector::new(config.detector.clone()),
            estimator: AmbientLightEstimator::new(config.ambient.sample_count),
            night: NightModeController::new(&config.ambient),
            patrol: PatrolScheduler::new(&config.patrol),
            fusion: DetectionFusion::new(config.fusion.intruder_mode),
            ambient_interval: Duration::from_secs(config.ambient.sample_interval_secs),
            last_ambient_sample: None,
            started_at: Instant::now(),
            motion_enabled: true,
            config,
            source,
            classifier,
            publisher,
            bus,
            escalator,
        }
    }

    /// One sensing cycle: capture, ambient update, change evaluation,
    /// escalation, then any due patrol capture
    pub async fn process_cycle(&mut self, now: Instant) {
        if self.motion_enabled {
            match self.source.capture_frame().await {
                Some(frame) => {
                    self.update_ambient(&frame, now).await;
                    self.evaluate_frame(&frame, now).await;
                    self.source.release_frame(frame).await;
                }
                None => debug!("No frame available, skipping cycle"),
            }
        }

        if self.patrol.tick(now) {
            self.run_patrol(now).await;
        }
    }

    async fn evaluate_frame(&mut self, frame: &FrameBuffer, now: Instant) {
        let result = self.detector.evaluate(frame, now);
        if !result.detected {
            return;
        }

        let consecutive = self.detector.consecutive_count();
        self.publish_event(SentrycamEvent::MotionDetected {
            changed_units: result.changed_units,
            percent: result.percent,
            timestamp: Utc::now(),
            consecutive_count: consecutive,
        })
        .await;

        match self.classifier.submit(frame, CaptureContext::Motion).await {
            Ok(response) => self.apply_fusion(&response, CaptureContext::Motion).await,
            Err(e) => warn!(error = %e, "Classification submit failed"),
        }

        // Fires exactly once per accumulation, on the cycle the count
        // first reaches the trigger
        if consecutive == self.config.alert.trigger_frames {
            self.escalator
                .trigger(AlertReason::Motion, self.night.active());
        }
    }

    async fn update_ambient(&mut self, frame: &FrameBuffer, now: Instant) {
        let due = match self.last_ambient_sample {
            Some(last) => now.saturating_duration_since(last) >= self.ambient_interval,
            None => true,
        };
        if !due {
            return;
        }
        self.last_ambient_sample = Some(now);

        let brightness = self.estimator.estimate(frame);
        if let Some(change) = self.night.update(brightness, self.source.as_ref()).await {
            self.publish_event(SentrycamEvent::NightModeChanged {
                active: change.to_night,
                ambient: change.ambient,
            })
            .await;
        }
    }

    /// Patrol frames run through the same change detector (and share its
    /// cooldown), so a patrol capture can advance escalation too
    async fn run_patrol(&mut self, now: Instant) {
        let frame = match self.source.capture_frame().await {
            Some(f) => f,
            None => {
                warn!("Patrol capture unavailable");
                return;
            }
        };

        let result = self.detector.evaluate(&frame, now);
        let ambient = self.estimator.estimate(&frame);

        if self.config.patrol.submit_to_ai {
            match self.classifier.submit(&frame, CaptureContext::Patrol).await {
                Ok(response) => self.apply_fusion(&response, CaptureContext::Patrol).await,
                Err(e) => warn!(error = %e, "Patrol submit failed"),
            }
        }

        self.publish_event(SentrycamEvent::PatrolCapture {
            motion: result.detected,
            size: frame.len(),
            ambient,
        })
        .await;

        if result.detected && self.detector.consecutive_count() == self.config.alert.trigger_frames
        {
            self.escalator
                .trigger(AlertReason::Motion, self.night.active());
        }

        self.source.release_frame(frame).await;
    }

    async fn apply_fusion(&mut self, response: &Value, context: CaptureContext) {
        if let Some(outcome) = self.fusion.ingest(response, context) {
            if outcome.changed {
                self.publish_event(SentrycamEvent::PersonCountChanged {
                    count: outcome.person_count,
                    context: context.as_str().to_string(),
                })
                .await;
            }
            if outcome.escalate {
                self.escalator
                    .trigger(AlertReason::Person, self.night.active());
            }
        }
    }

    /// Fold in a classification result that arrived over the network
    /// rather than from a submission this core made. Unparseable payloads
    /// are dropped without touching state.
    pub async fn ingest_remote(&mut self, payload: &str, context: CaptureContext) {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => self.apply_fusion(&value, context).await,
            Err(e) => debug!(error = %e, "Dropping unparseable remote payload"),
        }
    }

    /// Route an external `{"command": …}` message. Unknown or malformed
    /// commands are logged and ignored.
    pub async fn handle_command(&mut self, raw: &str) {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed command");
                return;
            }
        };
        let command = match value.get("command").and_then(Value::as_str) {
            Some(c) => c,
            None => {
                warn!("Ignoring message without a command field");
                return;
            }
        };

        info!(command, "Handling command");
        match command {
            "capture" | "detect" => self.capture_on_command().await,
            "patrol_start" => self.patrol.set_enabled(true),
            "patrol_stop" => self.patrol.set_enabled(false),
            "intruder_mode" => {
                let enabled = value.get("enabled").and_then(Value::as_bool).unwrap_or(true);
                self.fusion.set_intruder_mode(enabled);
                info!(enabled, "Intruder mode updated");
            }
            "motion_detect" => {
                self.motion_enabled = value
                    .get("enabled")
                    .and_then(Value::as_bool)
                    .unwrap_or(!self.motion_enabled);
                info!(enabled = self.motion_enabled, "Motion detection updated");
            }
            "status" => self.publish_status().await,
            other => warn!(command = other, "Unknown command ignored"),
        }
    }

    async fn capture_on_command(&mut self) {
        match self.source.capture_frame().await {
            Some(frame) => {
                match self.classifier.submit(&frame, CaptureContext::Command).await {
                    Ok(response) => self.apply_fusion(&response, CaptureContext::Command).await,
                    Err(e) => warn!(error = %e, "Command capture submit failed"),
                }
                self.source.release_frame(frame).await;
            }
            None => warn!("Command capture unavailable"),
        }
    }

    /// Publish the periodic status heartbeat
    pub async fn publish_status(&self) {
        let payload = json!({
            "device": self.config.messaging.device_id,
            "status": "online",
            "motion_detect": self.motion_enabled,
            "patrol": self.patrol.enabled(),
            "intruder_mode": self.fusion.intruder_mode(),
            "night_mode": self.night.active(),
            "motion_events": self.detector.event_count(),
            "person_count": self.fusion.person_count(),
            "uptime": self.started_at.elapsed().as_secs(),
        });
        let topic = format!("{}camera/status", self.config.messaging.topic_prefix);
        if let Err(e) = self.publisher.publish(&topic, payload, false).await {
            warn!(error = %e, "Status publish failed");
        }
    }

    async fn publish_event(&self, event: SentrycamEvent) {
        if let Some(topic) = event.topic(&self.config.messaging.topic_prefix) {
            if let Err(e) = self
                .publisher
                .publish(&topic, event.payload(), event.retain())
                .await
            {
                warn!(topic = %topic, error = %e, "Outward publish failed");
            }
        }
        if let Err(e) = self.bus.publish(event).await {
            warn!(error = %e, "Event bus publish failed");
        }
    }

    /// Run the sensing loop until interrupted
    pub async fn run(&mut self) -> Result<()> {
        info!(
            device = %self.config.messaging.device_id,
            tick_ms = self.config.system.tick_ms,
            "Perimeter sentinel started"
        );

        let mut tick = tokio::time::interval(Duration::from_millis(self.config.system.tick_ms));
        let status_interval = Duration::from_secs(self.config.system.status_interval_secs);
        let mut last_status = Instant::now();
        self.publish_status().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let now = Instant::now();
                    self.process_cycle(now).await;
                    if now.saturating_duration_since(last_status) >= status_interval {
                        last_status = now;
                        self.publish_status().await;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.publish_status().await;
        Ok(())
    }

    /// Run a fixed number of sensing cycles, then publish a final status.
    /// Used by the demo binary.
    pub async fn run_cycles(&mut self, cycles: u64) {
        let tick = Duration::from_millis(self.config.system.tick_ms);
        for _ in 0..cycles {
            self.process_cycle(Instant::now()).await;
            tokio::time::sleep(tick).await;
        }
        self.publish_status().await;
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn alert_state(&self) -> AlertState {
        self.escalator.state()
    }

    pub fn alerts_fired(&self) -> u64 {
        self.escalator.alerts_fired()
    }

    pub fn motion_enabled(&self) -> bool {
        self.motion_enabled
    }

    pub fn patrol_enabled(&self) -> bool {
        self.patrol.enabled()
    }

    pub fn intruder_mode(&self) -> bool {
        self.fusion.intruder_mode()
    }

    pub fn night_active(&self) -> bool {
        self.night.active()
    }

    pub fn person_count(&self) -> u32 {
        self.fusion.person_count()
    }

    pub fn motion_events(&self) -> u64 {
        self.detector.event_count()
    }
}
