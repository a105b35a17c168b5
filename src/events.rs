use crate::error::SentrycamError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events the perimeter core produces.
///
/// Every variant except `SystemError` maps to an outward topic and payload
/// for the messaging collaborator; `SystemError` stays on the internal bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SentrycamEvent {
    /// The change detector declared a change event
    MotionDetected {
        changed_units: u32,
        percent: f32,
        timestamp: DateTime<Utc>,
        consecutive_count: u32,
    },
    /// Night mode flipped
    NightModeChanged { active: bool, ambient: u8 },
    /// The escalation state machine entered Alerting
    IntruderAlert {
        reason: String,
        timestamp: DateTime<Utc>,
        night: bool,
    },
    /// Fusion observed a different person count than before
    PersonCountChanged { count: u32, context: String },
    /// A patrol capture completed
    PatrolCapture { motion: bool, size: usize, ambient: u8 },
    /// A component reported a non-fatal error
    SystemError { component: String, error: String },
}

impl SentrycamEvent {
    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SentrycamEvent::MotionDetected { .. } => "motion_detected",
            SentrycamEvent::NightModeChanged { .. } => "night_mode_changed",
            SentrycamEvent::IntruderAlert { .. } => "intruder_alert",
            SentrycamEvent::PersonCountChanged { .. } => "person_count_changed",
            SentrycamEvent::PatrolCapture { .. } => "patrol_capture",
            SentrycamEvent::SystemError { .. } => "system_error",
        }
    }

    /// Outward topic suffix, or `None` for internal-only events
    pub fn topic_suffix(&self) -> Option<&'static str> {
        match self {
            SentrycamEvent::MotionDetected { .. } => Some("camera/motion"),
            SentrycamEvent::NightModeChanged { .. } => Some("camera/night"),
            SentrycamEvent::IntruderAlert { .. } => Some("camera/alert"),
            SentrycamEvent::PersonCountChanged { .. } => Some("camera/person"),
            SentrycamEvent::PatrolCapture { .. } => Some("camera/patrol"),
            SentrycamEvent::SystemError { .. } => None,
        }
    }

    /// Whether the outward publish is retained
    pub fn retain(&self) -> bool {
        matches!(self, SentrycamEvent::IntruderAlert { .. })
    }

    /// Full outward topic under the given prefix
    pub fn topic(&self, prefix: &str) -> Option<String> {
        self.topic_suffix().map(|s| format!("{}{}", prefix, s))
    }

    /// Outward JSON payload. Field names are the compatibility contract.
    pub fn payload(&self) -> Value {
        match self {
            SentrycamEvent::MotionDetected {
                changed_units,
                percent,
                timestamp,
                consecutive_count,
            } => json!({
                "changed_units": changed_units,
                "percent": percent,
                "timestamp": timestamp.to_rfc3339(),
                "consecutive_count": consecutive_count,
            }),
            SentrycamEvent::NightModeChanged { active, ambient } => json!({
                "active": active,
                "ambient": ambient,
            }),
            SentrycamEvent::IntruderAlert {
                reason,
                timestamp,
                night,
            } => json!({
                "reason": reason,
                "timestamp": timestamp.to_rfc3339(),
                "night": night,
            }),
            SentrycamEvent::PersonCountChanged { count, context } => json!({
                "count": count,
                "context": context,
            }),
            SentrycamEvent::PatrolCapture {
                motion,
                size,
                ambient,
            } => json!({
                "motion": motion,
                "size": size,
                "ambient": ambient,
            }),
            SentrycamEvent::SystemError { component, error } => json!({
                "component": component,
                "error": error,
            }),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SentrycamEvent::MotionDetected {
                changed_units,
                percent,
                consecutive_count,
                ..
            } => format!(
                "Change detected: {} units ({:.1}%), {} consecutive",
                changed_units, percent, consecutive_count
            ),
            SentrycamEvent::NightModeChanged { active, ambient } => format!(
                "Night mode {} (ambient {})",
                if *active { "on" } else { "off" },
                ambient
            ),
            SentrycamEvent::IntruderAlert { reason, night, .. } => {
                format!("Intruder alert: {} (night: {})", reason, night)
            }
            SentrycamEvent::PersonCountChanged { count, context } => {
                format!("Person count now {} (context: {})", count, context)
            }
            SentrycamEvent::PatrolCapture {
                motion,
                size,
                ambient,
            } => format!(
                "Patrol capture: {} bytes, motion={}, ambient={}",
                size, motion, ambient
            ),
            SentrycamEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }
}

/// Async event bus for in-process subscribers using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<SentrycamEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SentrycamEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: SentrycamEvent) -> Result<usize, SentrycamError> {
        // Log important events at appropriate levels
        match &event {
            SentrycamEvent::IntruderAlert { reason, night, .. } => {
                warn!("Intruder alert: {} (night: {})", reason, night);
            }
            SentrycamEvent::MotionDetected {
                changed_units,
                consecutive_count,
                ..
            } => {
                info!(
                    "Change detected: {} units, {} consecutive",
                    changed_units, consecutive_count
                );
            }
            SentrycamEvent::NightModeChanged { active, ambient } => {
                info!(
                    "Night mode {} at ambient {}",
                    if *active { "enabled" } else { "disabled" },
                    ambient
                );
            }
            SentrycamEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        // A bus with no subscribers is not an error for this core
        match self.sender.send(event) {
            Ok(n) => Ok(n),
            Err(_) => Ok(0),
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
