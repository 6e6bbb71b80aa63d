use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::export::{default_columns, Column};
use crate::postural::PosturalTrigger;
use crate::task::{SequenceMode, TaskKind, TriggerKind, TriggerPolicy};

/// Application configuration. Every section has defaults, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub mqtt: MqttConfig,
    pub task: TaskConfig,
    pub calibration: CalibrationConfig,
    pub tapping: TappingConfig,
    pub postural: PosturalConfig,
    pub export: ExportConfig,
    pub channels: ChannelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub title: String,
    pub fullscreen: bool,
    pub vsync: bool,
    /// Frame ticks per second of the task loop
    pub framerate: f64,
    pub show_speed_trace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Used when `MQTT_HOST` is not set
    pub broker: String,
    /// Used when `MQTT_PORT` is not set
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub qos: u8,
    pub keep_alive: u16,
}

/// Target task layout, sequence and trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub kind: TaskKind,
    /// Overrides the task's usual trigger
    pub trigger: Option<TriggerKind>,
    pub radius_px: f64,
    /// Clock: distance from the centre; corners: side of the square
    pub spacing_px: f64,
    /// Corners: inset of the NW corner from the display edge
    pub edge_px: f64,
    /// Corners-depth: near/far separation in sensor mm
    pub box_depth_mm: f64,
    pub load_time_s: f64,
    pub speed_threshold: f64,
    /// Overrides the task's usual sequence mode
    pub sequence_mode: Option<SequenceMode>,
    pub sequence_len: usize,
    /// Cover-paths: how often each ordered path must be taken
    pub path_hits: u32,
    /// Use the short practice pattern
    pub practice: bool,
    /// Fixed seed for reproducible random sequences
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub path: String,
    pub recalibrate_on_start: bool,
    pub marker_spacing_px: f64,
    pub hold_seconds: f64,
    pub min_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TappingConfig {
    pub gap_mm: f64,
    pub duration_s: f64,
    pub countdown_s: f64,
    /// Largest tap-count spread tolerated within a series
    pub margin: u32,
    pub successes: usize,
    pub max_trials: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PosturalConfig {
    pub duration_s: f64,
    pub trigger: PosturalTrigger,
    /// Interaction box centre and size, sensor mm
    pub box_center_mm: [f64; 3],
    pub box_size_mm: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: String,
    pub participant: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub calibration_channel_capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            title: "TrackHub".to_string(),
            fullscreen: false,
            vsync: true,
            framerate: 60.0,
            show_speed_trace: true,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "localhost".to_string(),
            port: 1883,
            client_id: "trackhub_client".to_string(),
            topic: "tracking/frames".to_string(),
            qos: 1,
            keep_alive: 5,
        }
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            kind: TaskKind::Clock,
            trigger: None,
            radius_px: 40.0,
            spacing_px: 300.0,
            edge_px: 150.0,
            box_depth_mm: 100.0,
            load_time_s: 0.5,
            speed_threshold: 50.0,
            sequence_mode: None,
            sequence_len: 41,
            path_hits: 2,
            practice: false,
            seed: None,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            path: "data/calibration.toml".to_string(),
            recalibrate_on_start: false,
            marker_spacing_px: 400.0,
            hold_seconds: 2.0,
            min_samples: 20,
        }
    }
}

impl Default for TappingConfig {
    fn default() -> Self {
        Self {
            gap_mm: 30.0,
            duration_s: 10.0,
            countdown_s: 3.0,
            margin: 5,
            successes: 5,
            max_trials: 10,
        }
    }
}

impl Default for PosturalConfig {
    fn default() -> Self {
        Self {
            duration_s: 15.0,
            trigger: PosturalTrigger::Keyboard,
            box_center_mm: [0.0, 200.0, 0.0],
            box_size_mm: [220.0, 220.0, 150.0],
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: "data".to_string(),
            participant: String::new(),
            columns: default_columns(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            calibration_channel_capacity: 1000,
        }
    }
}

impl TaskConfig {
    pub fn trigger_kind(&self) -> TriggerKind {
        self.trigger.unwrap_or_else(|| self.kind.default_trigger())
    }

    pub fn sequence_mode(&self) -> SequenceMode {
        self.sequence_mode.unwrap_or_else(|| self.kind.default_sequence_mode())
    }

    pub fn trigger_policy(&self, framerate: f64) -> TriggerPolicy {
        match self.trigger_kind() {
            TriggerKind::DwellFill => TriggerPolicy::DwellFill {
                load_time: self.load_time_s,
                framerate,
            },
            TriggerKind::SpeedGated => TriggerPolicy::SpeedGated {
                threshold: self.speed_threshold,
            },
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;
        std::fs::write(path, content).map_err(ConfigError::IoError)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.window.width <= 0.0 || self.window.height <= 0.0 {
            return invalid("Window dimensions must be positive");
        }
        if !(self.window.framerate.is_finite() && self.window.framerate > 0.0) {
            return invalid("Framerate must be positive");
        }
        if !(self.task.radius_px.is_finite() && self.task.radius_px > 0.0) {
            return invalid("Target radius must be positive");
        }
        if self.task.kind.is_target_task() {
            self.task
                .trigger_policy(self.window.framerate)
                .validate()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
            if self.task.sequence_len == 0 && self.task.sequence_mode() != SequenceMode::CoverPaths {
                return invalid("Sequence length must be positive");
            }
        }
        if self.calibration.hold_seconds <= 0.0 {
            return invalid("Calibration hold time must be positive");
        }
        if self.calibration.min_samples < 2 {
            return invalid("Minimum calibration samples must be at least 2");
        }
        if self.tapping.duration_s <= 0.0 || self.tapping.successes == 0 {
            return invalid("Tapping needs a positive duration and at least one success");
        }
        if self.postural.duration_s <= 0.0 {
            return invalid("Postural duration must be positive");
        }
        if self.export.columns.is_empty() {
            return invalid("At least one export column is required");
        }
        if self.channels.calibration_channel_capacity == 0 {
            return invalid("Calibration channel capacity must be positive");
        }
        Ok(())
    }

    pub fn calibration_path(&self) -> PathBuf {
        PathBuf::from(&self.calibration.path)
    }

    pub fn export_directory(&self) -> PathBuf {
        PathBuf::from(&self.export.directory)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = AppConfig::load_from_file(&path)?;
        Ok(Self {
            config,
            config_path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Defaults when the file does not exist; a file that exists but does
    /// not load is an error
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self {
                config: AppConfig::default(),
                config_path: Some(path.to_path_buf()),
            });
        }
        let manager = Self::load_from_file(path)?;
        info!("Loaded config from {}", path.display());
        Ok(manager)
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_path {
            self.config.save_to_file(path)?;
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
