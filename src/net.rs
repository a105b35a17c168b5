use crate::error::{Result, SentrycamError};
use crate::frame::{CaptureContext, FrameBuffer};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// The remote AI classification collaborator.
///
/// Submission is synchronous from the core's point of view; any transport
/// timeout lives inside the implementation, not here.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Submit a frame for classification, tagged with why it was captured
    async fn submit(&self, frame: &FrameBuffer, context: CaptureContext) -> Result<Value>;
}

/// The outward messaging collaborator.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value, retain: bool) -> Result<()>;
}

/// One submission recorded by [`StaticClassifier`]
#[derive(Debug, Clone)]
pub struct Submission {
    pub frame_len: usize,
    pub context: CaptureContext,
}

/// In-process classifier returning a canned response, for tests and the
/// demo binary. Submissions are recorded; failures can be injected.
pub struct StaticClassifier {
    response: Mutex<Value>,
    fail: AtomicBool,
    submissions: Mutex<Vec<Submission>>,
}

impl StaticClassifier {
    /// Create a classifier that reports an empty scene
    pub fn new() -> Self {
        Self::with_response(json!({ "detections": [], "faces": [] }))
    }

    pub fn with_response(response: Value) -> Self {
        Self {
            response: Mutex::new(response),
            fail: AtomicBool::new(false),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn set_response(&self, response: Value) {
        *self.response.lock() = response;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }
}

impl Default for StaticClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for StaticClassifier {
    async fn submit(&self, frame: &FrameBuffer, context: CaptureContext) -> Result<Value> {
        self.submissions.lock().push(Submission {
            frame_len: frame.len(),
            context,
        });

        if self.fail.load(Ordering::SeqCst) {
            return Err(SentrycamError::upload("injected failure"));
        }

        debug!(
            "Classified frame {} ({} bytes, context {})",
            frame.id,
            frame.len(),
            context
        );
        Ok(self.response.lock().clone())
    }
}

/// One message recorded by [`MemoryPublisher`]
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Value,
    pub retain: bool,
}

/// In-process publisher that records every message, for tests and the
/// demo binary.
pub struct MemoryPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().clone()
    }

    pub fn messages_for(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: Value, retain: bool) -> Result<()> {
        debug!("Publish {} (retain: {}): {}", topic, retain, payload);
        self.messages.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }
}
