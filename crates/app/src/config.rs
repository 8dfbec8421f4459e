use std::path::{Path, PathBuf};
use std::str::FromStr;

use mechanics::SimulationConfig;
use serde::{Deserialize, Serialize};
use simplelog::LevelFilter;

use crate::error::AppError;

/// Where the output series and plot are written. `None` skips that artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub plot: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            plot: Some(PathBuf::from("adaptive_pid_simulation_results.png")),
            csv: Some(PathBuf::from("adaptive_pid_simulation_results.csv")),
            json: None,
        }
    }
}

/// Top-level run configuration, read from an optional JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationConfig,
    pub output: OutputConfig,
    /// One of off, error, warn, info, debug, trace
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            output: OutputConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_json(text: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn level_filter(&self) -> Result<LevelFilter, AppError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| AppError::LogLevel(self.log_level.clone()))
    }
}
