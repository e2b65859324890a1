//! Persistent controller configuration

use crate::cpu_temp::DEFAULT_SENSOR_PATH;
use crate::daemon::{LoopSettings, DEFAULT_FAN_GPIO, DEFAULT_INTERVAL};
use crate::errors::ConfigError;
use crate::fan::DutyCycleCurve;
use crate::fan_control::DEFAULT_FREQUENCY_HZ;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for the fan controller, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub gpiochip: u32,
    pub gpio: u32,
    pub frequency_hz: u32,
    pub interval_ms: u64,
    pub sensor_path: PathBuf,
    /// Replaces the vendor curve when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curve: Option<DutyCycleCurve>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            gpiochip: 0,
            gpio: DEFAULT_FAN_GPIO,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            sensor_path: PathBuf::from(DEFAULT_SENSOR_PATH),
            curve: None,
        }
    }
}

impl ControllerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        let config: ControllerConfig = serde_json::from_str(&json)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load `path` if given; otherwise the default path if it exists, or the
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let default_path = Self::get_config_path();
        if default_path.exists() {
            Self::load_from_file(&default_path)
        } else {
            debug!(
                "No configuration at {}, using defaults",
                default_path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn get_config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home)
            .join(".pi_fan_control")
            .join("config.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_hz == 0 {
            return Err(ConfigError::Setting(
                "frequency_hz must be positive".to_string(),
            ));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::Setting(
                "interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Curve in effect: the configured one, or the vendor curve.
    pub fn curve(&self) -> DutyCycleCurve {
        self.curve.clone().unwrap_or_default()
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            chip: self.gpiochip,
            line: self.gpio,
            frequency_hz: self.frequency_hz,
            interval: self.interval(),
        }
    }
}
