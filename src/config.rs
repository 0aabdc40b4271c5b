// src/config.rs
//! Configuration stored as JSON under the user's config directory

use crate::error::{Result, TrackerError};
use crate::position::DEFAULT_ACCURACY_THRESHOLD_M;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub gpsd_host: String,
    pub gpsd_port: u16,
    /// Fixes coarser than this are ignored once a trail exists
    pub accuracy_threshold_m: f64,
    pub playback_speed: u32,
    pub fences_file: Option<PathBuf>,
    /// History entries printed when tracking ends
    pub history_display: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            gpsd_host: "localhost".to_string(),
            gpsd_port: 2947,
            accuracy_threshold_m: DEFAULT_ACCURACY_THRESHOLD_M,
            playback_speed: 1,
            fences_file: None,
            history_display: 5,
        }
    }
}

impl TrackerConfig {
    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Load from a file; a missing file gives the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config_missing_using_defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Other(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TrackerError::Other(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Other(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Other(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| TrackerError::Other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| TrackerError::Other("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("location-tracker"))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Where fences are persisted
    pub fn fences_path(&self) -> Result<PathBuf> {
        match &self.fences_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("geofences.json")),
        }
    }

    pub fn playback_speed(&self) -> NonZeroU32 {
        NonZeroU32::new(self.playback_speed).unwrap_or(NonZeroU32::MIN)
    }

    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.gpsd_host = host;
        self.gpsd_port = port;
    }
}
