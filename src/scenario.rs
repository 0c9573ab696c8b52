use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{GeoPoint, ScenarioName};
use crate::error::HourlyError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AltitudeModel {
    pub ascent_rate: f64,
    pub descent_rate: f64,
    pub burst_altitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub name: String,
    pub email: String,
}

/// A scenario record as stored on disk. The password authorizes edits through
/// the web form and must never reach the predictor or the published manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioDefinition {
    #[serde(default)]
    pub name: Option<String>,
    pub launch_site: GeoPoint,
    pub altitude_model: AltitudeModel,
    pub owner: Owner,
    pub password: String,
}

impl ScenarioDefinition {
    /// The password-stripped copy used for everything downstream.
    pub fn template(&self) -> ScenarioTemplate {
        ScenarioTemplate {
            name: self.name.clone(),
            launch_site: self.launch_site,
            altitude_model: self.altitude_model,
            owner: self.owner.clone(),
        }
    }
}

/// Everything from the definition except the password. This is the only
/// scenario shape that crosses into run artifacts and manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub launch_site: GeoPoint,
    pub altitude_model: AltitudeModel,
    pub owner: Owner,
}

/// Reads scenario records out of the watched scenarios directory.
#[derive(Debug, Clone)]
pub struct ScenarioStore {
    dir: PathBuf,
}

impl ScenarioStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, name: &ScenarioName) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    pub fn load(&self, name: &ScenarioName) -> Result<ScenarioDefinition, HourlyError> {
        let path = self.record_path(name);
        let content =
            fs::read_to_string(&path).map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        serde_json::from_str(&content).map_err(|err| HourlyError::ScenarioParse {
            name: name.to_string(),
            message: err.to_string(),
        })
    }

    /// All validly named scenarios currently on disk. Invalid filenames are
    /// logged and skipped; the `.gitignore` marker is skipped silently.
    pub fn names(&self) -> Result<Vec<ScenarioName>, HourlyError> {
        let entries =
            fs::read_dir(&self.dir).map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        let mut names = Vec::new();
        for entry in entries.filter_map(|entry| entry.ok()) {
            let filename = entry.file_name();
            let Some(filename) = filename.to_str() else {
                continue;
            };
            if filename == ".gitignore" {
                continue;
            }
            match ScenarioName::from_filename(filename) {
                Ok(name) => names.push(name),
                Err(err) => warn!("bad scenario filename {filename}: {err}"),
            }
        }
        names.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const RECORD: &str = r#"{
        "name": "Mission 42",
        "launch-site": {"latitude": 52.2135, "longitude": 0.0964, "altitude": 14.0},
        "altitude-model": {"ascent-rate": 5.0, "descent-rate": 5.0, "burst-altitude": 30000.0},
        "owner": {"name": "Redacted", "email": "red@ct.ed"},
        "password": "hunter2"
    }"#;

    #[test]
    fn parses_on_disk_record() {
        let def: ScenarioDefinition = serde_json::from_str(RECORD).unwrap();
        assert_eq!(def.launch_site.latitude, 52.2135);
        assert_eq!(def.altitude_model.burst_altitude, 30000.0);
        assert_eq!(def.owner.email, "red@ct.ed");
        assert_eq!(def.password, "hunter2");
    }

    #[test]
    fn template_never_serializes_password() {
        let def: ScenarioDefinition = serde_json::from_str(RECORD).unwrap();
        let json = serde_json::to_string(&def.template()).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("hunter2"));
        assert!(json.contains("launch-site"));
        assert!(json.contains("altitude-model"));
    }

    #[test]
    fn load_reports_parse_failures() {
        let temp = tempfile::tempdir().unwrap();
        let store = ScenarioStore::new(temp.path().to_path_buf());
        fs::write(temp.path().join("broken.json"), b"{not json").unwrap();

        let name: ScenarioName = "broken".parse().unwrap();
        let err = store.load(&name).unwrap_err();
        assert_matches!(err, HourlyError::ScenarioParse { .. });
    }

    #[test]
    fn names_skips_invalid_entries() {
        let temp = tempfile::tempdir().unwrap();
        let store = ScenarioStore::new(temp.path().to_path_buf());
        for filename in ["alpha.json", "beta.json", "lib.json", "notes.txt", ".gitignore"] {
            fs::write(temp.path().join(filename), b"{}").unwrap();
        }

        let names = store.names().unwrap();
        let names: Vec<&str> = names.iter().map(|name| name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
