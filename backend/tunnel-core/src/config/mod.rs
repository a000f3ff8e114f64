mod duration_format;

use crate::error::config::ConfigError;
use crate::{CONNECTING_STATE_WAIT_DELAY, DEFAULT_TIMEOUT};

use common::ErrorLocation;

use std::panic::Location;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "tunnel-ipc.json";
const CONFIG_VERSION: u32 = 1;
const MAX_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const MAX_CONNECTING_STATE_WAIT_DELAY: Duration = Duration::from_secs(60);

// ============================================
// CONFIG STRUCTS
// ============================================

/// Tunables applied to every send-message operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationConfig {
    /// Deadline for the whole round trip, before any connecting-state extension.
    #[serde(default = "default_timeout", with = "duration_format")]
    pub timeout: Duration,

    /// How long after launch a `connecting` tunnel is left alone.
    #[serde(
        default = "default_connecting_state_wait_delay",
        with = "duration_format"
    )]
    pub connecting_state_wait_delay: Duration,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connecting_state_wait_delay: default_connecting_state_wait_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpcConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub operation: OperationConfig,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            operation: OperationConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}
fn default_connecting_state_wait_delay() -> Duration {
    CONNECTING_STATE_WAIT_DELAY
}

// ============================================
// IMPLEMENTATION
// ============================================

impl IpcConfig {
    /// Load config from `{config_dir}/tunnel-ipc.json`.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, parsed or validated.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::Read {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: IpcConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::Parse {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/tunnel-ipc.json` using temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation, serialization,
    /// write or rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        let timeout = self.operation.timeout;
        if timeout.is_zero() || timeout > MAX_TIMEOUT {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid timeout: {} (must be above 0s and at most {})",
                    humantime::format_duration(timeout),
                    humantime::format_duration(MAX_TIMEOUT)
                ),
            });
        }

        let wait_delay = self.operation.connecting_state_wait_delay;
        if wait_delay > MAX_CONNECTING_STATE_WAIT_DELAY {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid connecting state wait delay: {} (must be at most {})",
                    humantime::format_duration(wait_delay),
                    humantime::format_duration(MAX_CONNECTING_STATE_WAIT_DELAY)
                ),
            });
        }

        Ok(())
    }
}
