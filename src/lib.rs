pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod source;
pub mod net;
pub mod detector;
pub mod night;
pub mod alert;
pub mod patrol;
pub mod fusion;
pub mod sentinel;

pub use config::SentrycamConfig;
pub use error::{Result, SentrycamError};
pub use events::{EventBus, SentrycamEvent};
pub use frame::{CaptureContext, ExposureProfile, FrameBuffer};
pub use source::{FrameSource, SyntheticFrameSource};
pub use net::{Classifier, MemoryPublisher, PublishedMessage, Publisher, StaticClassifier, Submission};
pub use detector::{ChangeDetector, ChangeResult, MotionState};
pub use night::{AmbientLightEstimator, ModeChange, NightModeController};
pub use alert::{AlertEscalator, AlertReason, AlertState};
pub use patrol::PatrolScheduler;
pub use fusion::{DetectionFusion, FusionOutcome};
pub use sentinel::PerimeterSentinel;
