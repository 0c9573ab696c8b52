use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HourlyError {
    #[error("invalid scenario name: {0}")]
    InvalidScenarioName(String),

    #[error("invalid dataset name: {0}")]
    InvalidDatasetName(String),

    #[error("failed to parse scenario {name}: {message}")]
    ScenarioParse { name: String, message: String },

    #[error("dataset {0} disappeared mid-run")]
    DatasetRace(PathBuf),

    #[error("prediction process exited with code {code}: {stderr_path}")]
    ProcessFailure { code: i32, stderr_path: PathBuf },

    #[error("malformed predictor output: {0}")]
    OutputParse(String),

    #[error("missing config file hourly.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("watch error: {0}")]
    Watch(String),
}

impl HourlyError {
    /// True for the condition where the backing dataset vanished while a
    /// batch was in flight. Callers abort the whole batch on this and wait
    /// for the next dataset event instead of retrying.
    pub fn is_race(&self) -> bool {
        matches!(self, HourlyError::DatasetRace(_))
    }
}
