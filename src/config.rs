//! Configuration loading for the dance controller

use crate::{Result, SpotDanceError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Status poll cadence used when none is configured
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
/// Extra time allowed past the estimated routine length
pub const DEFAULT_COMPLETION_GRACE_MS: u64 = 200;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DaemonConfig {
    pub dance: Option<DanceConfig>,
    pub simulator: Option<SimulatorConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DanceConfig {
    pub poll_interval_ms: Option<u64>,
    pub completion_grace_ms: Option<u64>,
    pub pretty_telemetry: Option<bool>,
}

/// Initial state of the in-process simulated robot
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SimulatorConfig {
    pub estopped: Option<bool>,
    pub licensed: Option<bool>,
    /// Multiplier applied to routine runtime (2.0 = twice as slow)
    pub time_scale: Option<f64>,
    pub known_moves: Option<Vec<String>>,
    pub preloaded_sequences: Option<Vec<String>>,
    /// Never leave the dancing state
    pub stall: Option<bool>,
    /// Status code reported instead of completion
    pub fault_status: Option<i32>,
    /// Status code returned by execute requests
    pub execute_status: Option<i32>,
}

impl DaemonConfig {
    pub fn load_from_path(config_path: &str) -> Result<Self> {
        let contents = fs::read_to_string(config_path)
            .map_err(|e| SpotDanceError::Config(format!("Failed to read {}: {}", config_path, e)))?;
        Self::load_from_str(&contents)
    }

    pub fn load_from_str(contents: &str) -> Result<Self> {
        let config: DaemonConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let dance = self.dance();
        if dance.poll_interval_ms == Some(0) {
            return Err(SpotDanceError::Config(
                "dance.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(scale) = self.simulator().time_scale {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(SpotDanceError::Config(format!(
                    "simulator.time_scale must be a positive number, got {}",
                    scale
                )));
            }
        }
        Ok(())
    }

    /// Get dance configuration with defaults
    pub fn dance(&self) -> DanceConfig {
        self.dance.clone().unwrap_or_default()
    }

    /// Get simulator configuration with defaults
    pub fn simulator(&self) -> SimulatorConfig {
        self.simulator.clone().unwrap_or_default()
    }
}

impl DanceConfig {
    /// Status poll cadence; zero is never returned
    pub fn poll_interval(&self) -> Duration {
        let ms = self
            .poll_interval_ms
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms.unwrap_or(DEFAULT_COMPLETION_GRACE_MS))
    }

    pub fn pretty_telemetry(&self) -> bool {
        self.pretty_telemetry.unwrap_or(false)
    }
}

impl SimulatorConfig {
    pub fn estopped(&self) -> bool {
        self.estopped.unwrap_or(false)
    }

    pub fn licensed(&self) -> bool {
        self.licensed.unwrap_or(true)
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale.unwrap_or(1.0)
    }

    pub fn stall(&self) -> bool {
        self.stall.unwrap_or(false)
    }
}
