use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::HourlyError;

/// On-disk daemon configuration, kebab-case JSON.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub scenarios_dir: Utf8PathBuf,
    pub datasets_dir: Utf8PathBuf,
    pub web_dir: Utf8PathBuf,
    pub predictor: Utf8PathBuf,
    #[serde(default = "default_placeholder_page")]
    pub placeholder_page: String,
    #[serde(default = "default_ready_page")]
    pub ready_page: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config from `path`, or `hourly.json` in the current
    /// directory when none is given.
    pub fn resolve(path: Option<&str>) -> Result<Config, HourlyError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("hourly.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Err(HourlyError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HourlyError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HourlyError::ConfigParse(err.to_string()))?;
        Ok(config)
    }
}

fn default_placeholder_page() -> String {
    "../lib/predicting.html".to_string()
}

fn default_ready_page() -> String {
    "../lib/index.html".to_string()
}
