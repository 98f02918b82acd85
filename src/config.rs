use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::distance::PathLossModel;
use crate::histogram::DEFAULT_WINDOW_SIZE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub filter: FilterConfig,
    #[serde(default)]
    pub distance: PathLossModel,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Which denoiser a session applies to the raw RSSI stream. The two
/// strategies are mutually exclusive for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterStrategy {
    Kalman,
    Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Denoiser strategy: "kalman" or "mode"
    pub strategy: FilterStrategy,
    /// Kalman process noise variance Q, must be positive
    pub process_noise: f64,
    /// Kalman measurement noise variance R, must be positive
    pub measurement_noise: f64,
    /// Samples per histogram window for the mode strategy
    pub window_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Delay between delivered batches (milliseconds), 0 = as fast as input arrives
    pub pace_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for timestamped CSV export files
    pub directory: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            strategy: FilterStrategy::Kalman,
            process_noise: 0.33,
            measurement_noise: 2.847171,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig { pace_ms: 0 }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            directory: "exports".to_string(),
        }
    }
}

/// Configuration rejected before a session starts.
///
/// The estimator itself never validates: non-positive noise would silently
/// degrade the filter gain, so it is caught here at the boundary instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("process_noise must be positive, got {0}")]
    NonPositiveProcessNoise(f64),
    #[error("measurement_noise must be positive, got {0}")]
    NonPositiveMeasurementNoise(f64),
    #[error("path_loss_exponent must be positive, got {0}")]
    NonPositivePathLossExponent(f64),
    #[error("reference_distance must be positive, got {0}")]
    NonPositiveReferenceDistance(f64),
    #[error("window_size must be at least 1")]
    ZeroWindowSize,
    #[error("unknown filter strategy '{0}', expected 'kalman' or 'mode'")]
    UnknownStrategy(String),
}

impl FromStr for FilterStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kalman" => Ok(FilterStrategy::Kalman),
            "mode" | "histogram" => Ok(FilterStrategy::Mode),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter.process_noise <= 0.0 {
            return Err(ConfigError::NonPositiveProcessNoise(
                self.filter.process_noise,
            ));
        }
        if self.filter.measurement_noise <= 0.0 {
            return Err(ConfigError::NonPositiveMeasurementNoise(
                self.filter.measurement_noise,
            ));
        }
        if self.filter.window_size == 0 {
            return Err(ConfigError::ZeroWindowSize);
        }
        if self.distance.path_loss_exponent <= 0.0 {
            return Err(ConfigError::NonPositivePathLossExponent(
                self.distance.path_loss_exponent,
            ));
        }
        if self.distance.reference_distance <= 0.0 {
            return Err(ConfigError::NonPositiveReferenceDistance(
                self.distance.reference_distance,
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            filter: FilterConfig::default(),
            distance: PathLossModel::default(),
            replay: ReplayConfig::default(),
            export: ExportConfig::default(),
        }
    }
}
