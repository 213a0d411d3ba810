//! Engine configuration
//!
//! Caller-visible policy knobs for the compositing engine, stored as YAML.
//! Loading is tolerant: a missing or unparseable file logs and falls back to
//! defaults, so a bad config never blocks playback.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Compositing engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// What a read of a channel the region doesn't have produces.
    ///
    /// `true`: wrap around and replicate an existing channel (mono regions
    /// play on both sides of a stereo track). `false`: fill silence.
    /// Default: true
    pub replicate_missing_region_channels: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            replicate_missing_region_channels: true,
        }
    }
}

impl EngineConfig {
    /// Default config file location under the user config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("strata")
            .join("engine.yaml")
    }
}

/// Load configuration from a YAML file.
///
/// If the file doesn't exist, returns the default config. If the file exists
/// but is invalid, logs a warning and returns the default config.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("config: {:?} not found, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("config: failed to parse {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("config: failed to read {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories as needed.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write {:?}", path))?;
    Ok(())
}
