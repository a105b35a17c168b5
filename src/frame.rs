use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A borrowed view of one captured, compressed frame.
///
/// The data is shared-ownership so the core can hold onto a baseline copy
/// without cloning the bytes. Exactly one `FrameBuffer` is in flight per
/// capture; it must be handed back to the frame source via `release_frame`
/// once the cycle is done.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when the frame was captured
    pub timestamp: DateTime<Utc>,
    /// Compressed frame bytes (shared ownership)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl FrameBuffer {
    pub fn new(id: u64, timestamp: DateTime<Utc>, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
        }
    }

    /// Length of the compressed byte stream
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Capture-parameter regime requested from the frame source.
///
/// `Night` asks the sensor for raised gain and a longer exposure; `Day`
/// restores the defaults. The frame source owns the actual register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureProfile {
    Day,
    Night,
}

/// Why a frame was captured and submitted for remote classification.
///
/// The tag travels with the classification request and comes back with the
/// response so fusion can tell evidence captures apart from everything else
/// and avoid re-triggering the alert that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureContext {
    /// Frame captured because local change detection fired
    Motion,
    /// Frame captured by the periodic patrol cycle
    Patrol,
    /// Frame captured inside an active alert's evidence sequence
    IntruderEvidence,
    /// Frame captured on explicit external command
    Command,
}

impl CaptureContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureContext::Motion => "motion",
            CaptureContext::Patrol => "patrol",
            CaptureContext::IntruderEvidence => "intruder_evidence",
            CaptureContext::Command => "command",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "motion" => Some(CaptureContext::Motion),
            "patrol" => Some(CaptureContext::Patrol),
            "intruder_evidence" => Some(CaptureContext::IntruderEvidence),
            "command" => Some(CaptureContext::Command),
            _ => None,
        }
    }

    /// Whether fusion may escalate on a person detection for this context
    pub fn allows_escalation(&self) -> bool {
        !matches!(self, CaptureContext::IntruderEvidence)
    }
}

impl std::fmt::Display for CaptureContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buffer_creation() {
        let frame = FrameBuffer::new(1, Utc::now(), vec![0u8; 4800], 640, 480);
        assert_eq!(frame.id, 1);
        assert_eq!(frame.len(), 4800);
        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_context_round_trip() {
        for ctx in [
            CaptureContext::Motion,
            CaptureContext::Patrol,
            CaptureContext::IntruderEvidence,
            CaptureContext::Command,
        ] {
            assert_eq!(CaptureContext::parse(ctx.as_str()), Some(ctx));
        }
        assert_eq!(CaptureContext::parse("timelapse"), None);
    }

    #[test]
    fn test_evidence_context_blocks_escalation() {
        assert!(!CaptureContext::IntruderEvidence.allows_escalation());
        assert!(CaptureContext::Patrol.allows_escalation());
        assert!(CaptureContext::Motion.allows_escalation());
        assert!(CaptureContext::Command.allows_escalation());
    }
}
