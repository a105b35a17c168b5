use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SentrycamConfig {
    pub detector: DetectorConfig,
    pub ambient: AmbientConfig,
    pub alert: AlertConfig,
    pub patrol: PatrolConfig,
    pub fusion: FusionConfig,
    pub messaging: MessagingConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Per-byte absolute difference above which a sampled unit counts as changed
    #[serde(default = "default_byte_threshold")]
    pub byte_threshold: u8,

    /// Compare only every Nth byte of the compressed stream
    #[serde(default = "default_sample_stride")]
    pub sample_stride: usize,

    /// Minimum changed sampled units for a change event
    /// (50 units at stride 10 corresponds to 500 changed bytes)
    #[serde(default = "default_min_area_units")]
    pub min_area_units: u32,

    /// Minimum milliseconds between change events
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AmbientConfig {
    /// Number of evenly strided bytes averaged for the brightness proxy
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,

    /// Brightness below this value switches night mode on
    #[serde(default = "default_light_threshold_low")]
    pub light_threshold_low: u8,

    /// Seconds between ambient re-estimates
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AlertConfig {
    /// Consecutive change cycles that escalate to an alert
    #[serde(default = "default_trigger_frames")]
    pub trigger_frames: u32,

    /// Evidence frames captured per alert entry
    #[serde(default = "default_evidence_frames")]
    pub evidence_frames: u32,

    /// Milliseconds between evidence frames
    #[serde(default = "default_evidence_gap_ms")]
    pub evidence_gap_ms: u64,

    /// Milliseconds to let illumination settle before an evidence capture
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// On/off cycles of the visual deterrent pattern
    #[serde(default = "default_deterrent_cycles")]
    pub deterrent_cycles: u32,

    /// Milliseconds per deterrent on/off phase
    #[serde(default = "default_deterrent_pulse_ms")]
    pub deterrent_pulse_ms: u64,

    /// Illumination level driven during night evidence captures (0-255)
    #[serde(default = "default_illumination_level")]
    pub illumination_level: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PatrolConfig {
    /// Whether patrol starts enabled
    #[serde(default = "default_patrol_enabled")]
    pub enabled: bool,

    /// Seconds between patrol captures
    #[serde(default = "default_patrol_interval_secs")]
    pub interval_secs: u64,

    /// Submit patrol frames to the remote classifier
    #[serde(default = "default_patrol_submit")]
    pub submit_to_ai: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FusionConfig {
    /// Whether a remote person detection may escalate to an alert
    #[serde(default = "default_intruder_mode")]
    pub intruder_mode: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MessagingConfig {
    /// Prefix prepended to every published topic
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Device identifier included in status payloads
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Milliseconds between sensing cycles
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Seconds between status heartbeats
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,

    /// Internal event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SentrycamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("sentrycam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("detector.byte_threshold", default_byte_threshold() as i64)?
            .set_default("detector.sample_stride", default_sample_stride() as i64)?
            .set_default("detector.min_area_units", default_min_area_units() as i64)?
            .set_default("detector.cooldown_ms", default_cooldown_ms() as i64)?
            .set_default("ambient.sample_count", default_sample_count() as i64)?
            .set_default(
                "ambient.light_threshold_low",
                default_light_threshold_low() as i64,
            )?
            .set_default(
                "ambient.sample_interval_secs",
                default_sample_interval_secs() as i64,
            )?
            .set_default("alert.trigger_frames", default_trigger_frames() as i64)?
            .set_default("alert.evidence_frames", default_evidence_frames() as i64)?
            .set_default("alert.evidence_gap_ms", default_evidence_gap_ms() as i64)?
            .set_default("alert.settle_ms", default_settle_ms() as i64)?
            .set_default("alert.deterrent_cycles", default_deterrent_cycles() as i64)?
            .set_default(
                "alert.deterrent_pulse_ms",
                default_deterrent_pulse_ms() as i64,
            )?
            .set_default(
                "alert.illumination_level",
                default_illumination_level() as i64,
            )?
            .set_default("patrol.enabled", default_patrol_enabled())?
            .set_default(
                "patrol.interval_secs",
                default_patrol_interval_secs() as i64,
            )?
            .set_default("patrol.submit_to_ai", default_patrol_submit())?
            .set_default("fusion.intruder_mode", default_intruder_mode())?
            .set_default("messaging.topic_prefix", default_topic_prefix())?
            .set_default("messaging.device_id", default_device_id())?
            .set_default("system.tick_ms", default_tick_ms() as i64)?
            .set_default(
                "system.status_interval_secs",
                default_status_interval_secs() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with SENTRYCAM_ prefix
            .add_source(Environment::with_prefix("SENTRYCAM").separator("_"))
            .build()?;

        let config: SentrycamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detector.sample_stride == 0 {
            return Err(ConfigError::Message(
                "Detector sample_stride must be greater than 0".to_string(),
            ));
        }

        if self.detector.min_area_units == 0 {
            return Err(ConfigError::Message(
                "Detector min_area_units must be greater than 0".to_string(),
            ));
        }

        if self.ambient.sample_count == 0 {
            return Err(ConfigError::Message(
                "Ambient sample_count must be greater than 0".to_string(),
            ));
        }

        if self.alert.trigger_frames == 0 {
            return Err(ConfigError::Message(
                "Alert trigger_frames must be greater than 0".to_string(),
            ));
        }

        if self.alert.evidence_frames == 0 {
            return Err(ConfigError::Message(
                "Alert evidence_frames must be greater than 0".to_string(),
            ));
        }

        if self.patrol.interval_secs == 0 {
            return Err(ConfigError::Message(
                "Patrol interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.messaging.topic_prefix.is_empty() {
            return Err(ConfigError::Message(
                "Messaging topic_prefix must not be empty".to_string(),
            ));
        }

        if self.system.tick_ms == 0 {
            return Err(ConfigError::Message(
                "System tick_ms must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SentrycamConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig {
                byte_threshold: default_byte_threshold(),
                sample_stride: default_sample_stride(),
                min_area_units: default_min_area_units(),
                cooldown_ms: default_cooldown_ms(),
            },
            ambient: AmbientConfig {
                sample_count: default_sample_count(),
                light_threshold_low: default_light_threshold_low(),
                sample_interval_secs: default_sample_interval_secs(),
            },
            alert: AlertConfig {
                trigger_frames: default_trigger_frames(),
                evidence_frames: default_evidence_frames(),
                evidence_gap_ms: default_evidence_gap_ms(),
                settle_ms: default_settle_ms(),
                deterrent_cycles: default_deterrent_cycles(),
                deterrent_pulse_ms: default_deterrent_pulse_ms(),
                illumination_level: default_illumination_level(),
            },
            patrol: PatrolConfig {
                enabled: default_patrol_enabled(),
                interval_secs: default_patrol_interval_secs(),
                submit_to_ai: default_patrol_submit(),
            },
            fusion: FusionConfig {
                intruder_mode: default_intruder_mode(),
            },
            messaging: MessagingConfig {
                topic_prefix: default_topic_prefix(),
                device_id: default_device_id(),
            },
            system: SystemConfig {
                tick_ms: default_tick_ms(),
                status_interval_secs: default_status_interval_secs(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_byte_threshold() -> u8 {
    20
}
fn default_sample_stride() -> usize {
    10
}
fn default_min_area_units() -> u32 {
    50
}
fn default_cooldown_ms() -> u64 {
    3000
}

fn default_sample_count() -> usize {
    64
}
fn default_light_threshold_low() -> u8 {
    100
}
fn default_sample_interval_secs() -> u64 {
    5
}

fn default_trigger_frames() -> u32 {
    3
}
fn default_evidence_frames() -> u32 {
    5
}
fn default_evidence_gap_ms() -> u64 {
    200
}
fn default_settle_ms() -> u64 {
    100
}
fn default_deterrent_cycles() -> u32 {
    3
}
fn default_deterrent_pulse_ms() -> u64 {
    150
}
fn default_illumination_level() -> u8 {
    255
}

fn default_patrol_enabled() -> bool {
    false
}
fn default_patrol_interval_secs() -> u64 {
    30
}
fn default_patrol_submit() -> bool {
    true
}

fn default_intruder_mode() -> bool {
    false
}

fn default_topic_prefix() -> String {
    "sentrycam/".to_string()
}
fn default_device_id() -> String {
    "sentrycam-01".to_string()
}

fn default_tick_ms() -> u64 {
    500
}
fn default_status_interval_secs() -> u64 {
    10
}
fn default_event_bus_capacity() -> usize {
    100
}
