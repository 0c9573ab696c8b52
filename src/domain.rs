use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HourlyError;

/// Names that collide with fixed entries under the published web root and can
/// therefore never be scenario names.
const RESERVED_NAMES: [&str; 4] = ["scenarios", "lib", "edit", "static"];

/// A validated scenario name: the stem of a `<name>.json` file in the
/// scenarios directory, and the directory name of its published output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScenarioName(String);

impl ScenarioName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates a directory entry, stripping the mandatory `.json` suffix.
    pub fn from_filename(filename: &str) -> Result<Self, HourlyError> {
        let stem = filename
            .strip_suffix(".json")
            .ok_or_else(|| HourlyError::InvalidScenarioName(filename.to_string()))?;
        stem.parse()
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScenarioName {
    type Err = HourlyError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let is_valid = !value.is_empty()
            && !RESERVED_NAMES.contains(&value)
            && !value.contains('.')
            && !value.chars().any(std::path::is_separator);
        if !is_valid {
            return Err(HourlyError::InvalidScenarioName(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }
}

/// A latitude/longitude/altitude triple, used both for launch sites and
/// predicted landing locations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// A UTC calendar time broken into fields, matching the shape the predictor
/// configuration and the published manifest use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl From<DateTime<Utc>> for TimeParts {
    fn from(value: DateTime<Utc>) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            second: value.second(),
        }
    }
}
