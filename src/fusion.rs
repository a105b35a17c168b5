use crate::frame::CaptureContext;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of folding one classifier result into the fused state
#[derive(Debug, Clone, PartialEq)]
pub struct FusionOutcome {
    pub person_count: u32,
    pub face_count: u32,
    pub changed: bool,
    pub escalate: bool,
}

/// Folds classifier results into a single occupancy view.
///
/// Results arrive from multiple capture paths (motion, patrol, command) and
/// from remote ingest; all of them land here so downstream consumers see one
/// person count rather than per-path counts. Malformed payloads are dropped
/// without touching state.
pub struct DetectionFusion {
    person_count: u32,
    face_count: u32,
    intruder_mode: bool,
    last_result: Option<Value>,
}

impl DetectionFusion {
    pub fn new(intruder_mode: bool) -> Self {
        Self {
            person_count: 0,
            face_count: 0,
            intruder_mode,
            last_result: None,
        }
    }

    /// Fold one classifier result in. Returns `None` when the payload is
    /// malformed or when nothing changed and no escalation is warranted.
    pub fn ingest(&mut self, result: &Value, context: CaptureContext) -> Option<FusionOutcome> {
        let detections = match result.get("detections").and_then(Value::as_array) {
            Some(list) => list,
            None => {
                warn!(context = %context, "Dropping malformed classifier result");
                return None;
            }
        };

        let person_count = detections
            .iter()
            .filter(|d| Self::detection_label(d) == Some("person"))
            .count() as u32;
        let face_count = result
            .get("faces")
            .and_then(Value::as_array)
            .map(|f| f.len() as u32)
            .unwrap_or(0);

        let changed = person_count != self.person_count;
        let escalate =
            self.intruder_mode && person_count > 0 && context.allows_escalation();

        self.person_count = person_count;
        self.face_count = face_count;
        self.last_result = Some(result.clone());

        debug!(
            context = %context,
            person_count, face_count, changed, escalate,
            "Fused classifier result"
        );

        if changed || escalate {
            Some(FusionOutcome {
                person_count,
                face_count,
                changed,
                escalate,
            })
        } else {
            None
        }
    }

    // Newer classifier builds emit "label"; older ones emit "class"
    fn detection_label(detection: &Value) -> Option<&str> {
        detection
            .get("label")
            .or_else(|| detection.get("class"))
            .and_then(Value::as_str)
    }

    pub fn set_intruder_mode(&mut self, enabled: bool) {
        self.intruder_mode = enabled;
    }

    pub fn intruder_mode(&self) -> bool {
        self.intruder_mode
    }

    pub fn person_count(&self) -> u32 {
        self.person_count
    }

    pub fn face_count(&self) -> u32 {
        self.face_count
    }

    pub fn last_result(&self) -> Option<&Value> {
        self.last_result.as_ref()
    }
}
