//! Persistent test configuration
//!
//! Stores device selection, tone parameters, and analysis tolerances in a
//! JSON file. Missing fields fall back to defaults so older config files
//! keep loading.

use crate::audio::analyzer::Tolerances;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_sample_rate() -> u32 {
    crate::DEFAULT_SAMPLE_RATE
}

fn default_frequency() -> f64 {
    crate::DEFAULT_FREQUENCY_HZ
}

fn default_amplitude() -> f64 {
    crate::DEFAULT_AMPLITUDE
}

fn default_duration_secs() -> f64 {
    crate::DEFAULT_DURATION_SECS
}

/// Persistent test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Selected device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Reference tone frequency in Hz
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    /// Tone amplitude
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    /// Loopback capture duration in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    /// Analysis tolerances
    #[serde(default)]
    pub tolerances: Tolerances,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: default_sample_rate(),
            frequency_hz: default_frequency(),
            amplitude: default_amplitude(),
            duration_secs: default_duration_secs(),
            tolerances: Tolerances::default(),
        }
    }
}

impl TestConfig {
    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded config from disk");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}
