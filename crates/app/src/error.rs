use mechanics::SimulationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown log level `{0}`")]
    LogLevel(String),
    #[error("logger already initialised")]
    Logger(#[from] log::SetLoggerError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("plotting failed: {0}")]
    Plot(String),
}

impl AppError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
