use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{GeoPoint, ScenarioName, TimeParts};
use crate::error::HourlyError;
use crate::scenario::ScenarioTemplate;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const INDEX_FILE: &str = "index.html";

/// The published catalog of one scenario's full batch, replaced wholesale on
/// every successful run. Keys are run ids; BTreeMap keeps the serialized form
/// stable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    pub scenario_template: ScenarioTemplate,
    pub model: String,
    pub predictions: BTreeMap<String, PredictionRecord>,
}

impl Manifest {
    pub fn new(scenario_template: ScenarioTemplate, model: String) -> Self {
        Self {
            scenario_template,
            model,
            predictions: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PredictionRecord {
    pub landing_location: GeoPoint,
    pub landing_time: TimeParts,
    pub launch_time: TimeParts,
}

/// Owns the per-scenario output directories under the web root and the
/// placeholder/ready index swap that keeps half-written results invisible.
#[derive(Debug, Clone)]
pub struct SitePublisher {
    web_root: Utf8PathBuf,
    placeholder_page: String,
    ready_page: String,
}

impl SitePublisher {
    pub fn new(web_root: Utf8PathBuf, placeholder_page: String, ready_page: String) -> Self {
        Self {
            web_root,
            placeholder_page,
            ready_page,
        }
    }

    pub fn scenario_dir(&self, name: &ScenarioName) -> Utf8PathBuf {
        self.web_root.join(name.as_str())
    }

    pub fn manifest_path(&self, name: &ScenarioName) -> Utf8PathBuf {
        self.scenario_dir(name).join(MANIFEST_FILE)
    }

    /// Creates the scenario's output directory with its exclusion marker and
    /// an index pointing at the in-progress placeholder. The directory is
    /// scratch space owned by the running batch until publish or cleanup.
    pub fn begin(&self, name: &ScenarioName) -> Result<Utf8PathBuf, HourlyError> {
        let dir = self.scenario_dir(name);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        fs::write(dir.join(".gitignore").as_std_path(), "*\n")
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        swap_index(&dir, &self.placeholder_page)?;
        Ok(dir)
    }

    /// Writes the manifest in one atomic step, then repoints the index at the
    /// ready page. Readers see either the placeholder or the complete
    /// manifest, never a partial write.
    pub fn publish(&self, name: &ScenarioName, manifest: &Manifest) -> Result<(), HourlyError> {
        let dir = self.scenario_dir(name);
        let content = serde_json::to_vec_pretty(manifest)
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        write_bytes_atomic(&dir.join(MANIFEST_FILE), &content)?;
        swap_index(&dir, &self.ready_page)?;
        Ok(())
    }

    /// Removes the scenario's entire output directory, if present.
    pub fn clean(&self, name: &ScenarioName) -> Result<(), HourlyError> {
        let dir = self.scenario_dir(name);
        debug!("cleaning scenario {name}");
        if dir.as_std_path().exists() {
            fs::remove_dir_all(dir.as_std_path())
                .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        }
        Ok(())
    }
}

fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HourlyError> {
    let parent = path
        .parent()
        .ok_or_else(|| HourlyError::Filesystem("invalid destination path".to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".manifest")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| HourlyError::Filesystem(err.to_string()))?;
    // Windows cannot rename over an existing file; on unix the persist
    // replaces any previous manifest in one step, with no absent window.
    #[cfg(windows)]
    if path.as_std_path().exists() {
        fs::remove_file(path.as_std_path())
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
    }
    temp.persist(path.as_std_path())
        .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Atomically repoints `index.html`: the new link is created under a
/// temporary name and renamed over the old one, so the index always resolves.
fn swap_index(dir: &Utf8Path, target: &str) -> Result<(), HourlyError> {
    let temp = dir.join(".index.tmp");
    let _ = fs::remove_file(temp.as_std_path());
    make_symlink(target, temp.as_std_path())
        .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
    fs::rename(temp.as_std_path(), dir.join(INDEX_FILE).as_std_path())
        .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &str, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &str, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::GeoPoint;
    use crate::scenario::{AltitudeModel, Owner};

    fn publisher(root: &Path) -> SitePublisher {
        SitePublisher::new(
            Utf8PathBuf::from_path_buf(root.to_path_buf()).unwrap(),
            "../lib/predicting.html".to_string(),
            "../lib/index.html".to_string(),
        )
    }

    fn manifest() -> Manifest {
        let template = ScenarioTemplate {
            name: None,
            launch_site: GeoPoint {
                latitude: 52.0,
                longitude: 0.1,
                altitude: 14.0,
            },
            altitude_model: AltitudeModel {
                ascent_rate: 5.0,
                descent_rate: 5.0,
                burst_altitude: 30000.0,
            },
            owner: Owner {
                name: "Redacted".to_string(),
                email: "red@ct.ed".to_string(),
            },
        };
        Manifest::new(template, "2024010106".to_string())
    }

    #[test]
    fn begin_points_index_at_placeholder() {
        let temp = tempfile::tempdir().unwrap();
        let publisher = publisher(temp.path());
        let name: ScenarioName = "alpha".parse().unwrap();

        let dir = publisher.begin(&name).unwrap();
        assert_eq!(
            fs::read_to_string(dir.join(".gitignore").as_std_path()).unwrap(),
            "*\n"
        );
        let target = fs::read_link(dir.join(INDEX_FILE).as_std_path()).unwrap();
        assert_eq!(target, Path::new("../lib/predicting.html"));
        assert!(!dir.join(MANIFEST_FILE).as_std_path().exists());
    }

    #[test]
    fn publish_writes_manifest_and_swaps_index() {
        let temp = tempfile::tempdir().unwrap();
        let publisher = publisher(temp.path());
        let name: ScenarioName = "alpha".parse().unwrap();

        let dir = publisher.begin(&name).unwrap();
        publisher.publish(&name, &manifest()).unwrap();

        let content = fs::read_to_string(dir.join(MANIFEST_FILE).as_std_path()).unwrap();
        let parsed: Manifest = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.model, "2024010106");
        assert!(content.contains("scenario-template"));
        assert!(!content.contains("password"));

        let target = fs::read_link(dir.join(INDEX_FILE).as_std_path()).unwrap();
        assert_eq!(target, Path::new("../lib/index.html"));
    }

    #[test]
    fn republish_replaces_manifest_in_place() {
        let temp = tempfile::tempdir().unwrap();
        let publisher = publisher(temp.path());
        let name: ScenarioName = "alpha".parse().unwrap();

        publisher.begin(&name).unwrap();
        publisher.publish(&name, &manifest()).unwrap();

        let mut newer = manifest();
        newer.model = "2024010112".to_string();
        publisher.publish(&name, &newer).unwrap();

        let path = publisher.manifest_path(&name);
        let parsed: Manifest =
            serde_json::from_str(&fs::read_to_string(path.as_std_path()).unwrap()).unwrap();
        assert_eq!(parsed.model, "2024010112");
    }

    #[test]
    fn clean_removes_everything_and_tolerates_absence() {
        let temp = tempfile::tempdir().unwrap();
        let publisher = publisher(temp.path());
        let name: ScenarioName = "alpha".parse().unwrap();

        publisher.begin(&name).unwrap();
        publisher.clean(&name).unwrap();
        assert!(!publisher.scenario_dir(&name).as_std_path().exists());

        publisher.clean(&name).unwrap();
    }
}
