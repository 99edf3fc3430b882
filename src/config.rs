//! Configuration for the Fallwatch agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sampling and windowing parameters
    pub stream: StreamConfig,

    /// Pub/sub connection parameters
    pub transport: TransportConfig,

    /// Alerting behaviour
    pub logic: LogicConfig,

    /// Where fired alerts are appended
    pub logging: LoggingConfig,

    /// Classifier artifact location
    pub model: ModelConfig,

    /// Path for storing session statistics
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
}

/// Sampling rate and window geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub sample_rate_hz: f64,
    pub window_seconds: f64,
    pub step_seconds: f64,

    /// What to do with inbound messages missing an axis or timestamp
    #[serde(default)]
    pub missing_fields: MissingFieldPolicy,
}

impl StreamConfig {
    /// Number of samples in one inference window.
    pub fn win_len(&self) -> usize {
        samples_for(self.sample_rate_hz, self.window_seconds)
    }

    /// Number of new samples between two inference windows.
    pub fn step_len(&self) -> usize {
        samples_for(self.sample_rate_hz, self.step_seconds)
    }
}

/// Decimal places kept from `rate × seconds` before rounding to whole samples.
const SAMPLE_COUNT_PRECISION: f64 = 1e9;

fn samples_for(rate_hz: f64, seconds: f64) -> usize {
    // 50 Hz * 0.29 s is 14.499999999999998 in binary; snap it back to 14.5
    let product = (rate_hz * seconds * SAMPLE_COUNT_PRECISION).round() / SAMPLE_COUNT_PRECISION;
    let n = product.round();
    if n.is_finite() && n > 0.0 {
        n as usize
    } else {
        0
    }
}

/// Policy applied when an inbound message lacks a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFieldPolicy {
    /// Substitute 0.0 and count the occurrence
    #[default]
    Default,
    /// Drop the message
    Reject,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub topic: String,
    pub host: String,
    pub port: u16,
    pub keepalive_secs: u64,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Capacity of the queue between the transport thread and the engine
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicConfig {
    pub alert_cooldown_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
}

fn default_data_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fallwatch")
}

fn default_client_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("fallwatch-{host}")
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_path();

        Self {
            stream: StreamConfig {
                sample_rate_hz: 25.0,
                window_seconds: 1.0,
                step_seconds: 0.2,
                missing_fields: MissingFieldPolicy::Default,
            },
            transport: TransportConfig {
                topic: "sensors/accel".to_string(),
                host: "localhost".to_string(),
                port: 1883,
                keepalive_secs: 60,
                client_id: default_client_id(),
                queue_capacity: default_queue_capacity(),
            },
            logic: LogicConfig {
                alert_cooldown_seconds: 10.0,
            },
            logging: LoggingConfig {
                dir: data_dir.join("logs"),
            },
            model: ModelConfig {
                path: data_dir.join("models").join("fall_detector.json"),
            },
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load and validate configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the default configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fallwatch")
            .join("config.json")
    }

    /// Reject configurations that would leave window or stride scheduling undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stream;
        if !(s.sample_rate_hz.is_finite() && s.sample_rate_hz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "stream.sample_rate_hz must be positive, got {}",
                s.sample_rate_hz
            )));
        }
        if !(s.window_seconds.is_finite() && s.window_seconds > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "stream.window_seconds must be positive, got {}",
                s.window_seconds
            )));
        }
        if !(s.step_seconds.is_finite() && s.step_seconds > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "stream.step_seconds must be positive, got {}",
                s.step_seconds
            )));
        }
        if s.win_len() == 0 {
            return Err(ConfigError::Invalid(
                "window resolves to 0 samples".to_string(),
            ));
        }
        if s.step_len() == 0 {
            return Err(ConfigError::Invalid(
                "step resolves to 0 samples".to_string(),
            ));
        }

        let cooldown = self.logic.alert_cooldown_seconds;
        if !(cooldown.is_finite() && cooldown >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "logic.alert_cooldown_seconds must be >= 0, got {cooldown}"
            )));
        }
        if self.transport.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "transport.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
