use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use crate::error::HourlyError;

/// A timestamped weather snapshot on disk. Immutable; identity is the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    path: PathBuf,
    at: DateTime<Utc>,
}

impl Dataset {
    pub fn from_path(path: PathBuf) -> Result<Self, HourlyError> {
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .ok_or_else(|| HourlyError::InvalidDatasetName(path.display().to_string()))?;
        let at = parse_dataset_time(name)?;
        Ok(Self { path, at })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.at.timestamp()
    }

    /// The `YYYYMMDDHH` basename, recorded in manifests as the model name.
    pub fn model_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or_default()
    }
}

/// Parses a dataset directory entry named exactly `YYYYMMDDHH` (UTC) into a
/// timestamp. Anything else fails and is ignored by callers.
pub fn parse_dataset_time(name: &str) -> Result<DateTime<Utc>, HourlyError> {
    if name.len() != 10 || !name.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(HourlyError::InvalidDatasetName(name.to_string()));
    }
    let date = NaiveDate::parse_from_str(&name[..8], "%Y%m%d")
        .map_err(|_| HourlyError::InvalidDatasetName(name.to_string()))?;
    let hour: u32 = name[8..10]
        .parse()
        .map_err(|_| HourlyError::InvalidDatasetName(name.to_string()))?;
    let at = date
        .and_hms_opt(hour, 0, 0)
        .ok_or_else(|| HourlyError::InvalidDatasetName(name.to_string()))?;
    Ok(at.and_utc())
}

/// Tracks the single latest dataset. Replacement is strictly monotonic in the
/// parsed timestamp, so redundant filesystem events for an already-current
/// dataset never trigger a rerun sweep.
#[derive(Debug, Default)]
pub struct DatasetRegistry {
    latest: Option<Dataset>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&Dataset> {
        self.latest.as_ref()
    }

    /// Offers a candidate path. Unparseable names are ignored. Returns true
    /// iff the candidate became the new latest dataset, which obliges the
    /// caller to rerun every scenario.
    pub fn consider(&mut self, path: PathBuf) -> bool {
        let candidate = match Dataset::from_path(path) {
            Ok(dataset) => dataset,
            Err(_) => {
                debug!("file added was not a dataset");
                return false;
            }
        };
        let newer = match &self.latest {
            Some(current) => candidate.at > current.at,
            None => true,
        };
        if newer {
            self.latest = Some(candidate);
        }
        newer
    }

    /// Clears the registry iff `path` is the dataset currently held. Future
    /// runs are suspended until a new dataset event arrives.
    pub fn invalidate_if_current(&mut self, path: &Path) -> bool {
        if self.latest.as_ref().map(|dataset| dataset.path()) == Some(path) {
            self.latest = None;
            return true;
        }
        false
    }

    /// Startup scan: pick the entry with the greatest valid timestamp.
    /// Reverse-alphabetical order gives newest first for the fixed-width
    /// naming scheme, so the first parseable entry wins.
    pub fn bootstrap(&mut self, datasets_dir: &Path) -> Result<Option<&Dataset>, HourlyError> {
        let entries =
            fs::read_dir(datasets_dir).map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        let mut names: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        names.sort();
        for path in names.into_iter().rev() {
            if self.consider(path) {
                break;
            }
        }
        Ok(self.latest())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_fixed_width_names() {
        let at = parse_dataset_time("2024010100").unwrap();
        assert_eq!(at.timestamp(), 1_704_067_200);

        let at = parse_dataset_time("2024010106").unwrap();
        assert_eq!(at.timestamp(), 1_704_088_800);
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in ["", "202401010", "20240101000", "2024010a00", "2024013100x"] {
            let err = parse_dataset_time(bad).unwrap_err();
            assert_matches!(err, HourlyError::InvalidDatasetName(_));
        }
        // Hour field out of range.
        assert!(parse_dataset_time("2024010125").is_err());
    }

    #[test]
    fn consider_is_order_independent() {
        let mut forward = DatasetRegistry::new();
        assert!(forward.consider(PathBuf::from("/d/2024010100")));
        assert!(forward.consider(PathBuf::from("/d/2024010106")));

        let mut reverse = DatasetRegistry::new();
        assert!(reverse.consider(PathBuf::from("/d/2024010106")));
        assert!(!reverse.consider(PathBuf::from("/d/2024010100")));

        for registry in [forward, reverse] {
            let latest = registry.latest().unwrap();
            assert_eq!(latest.model_name(), "2024010106");
            assert_eq!(latest.epoch_seconds(), 1_704_088_800);
        }
    }

    #[test]
    fn equal_timestamp_does_not_replace() {
        let mut registry = DatasetRegistry::new();
        assert!(registry.consider(PathBuf::from("/d/2024010100")));
        assert!(!registry.consider(PathBuf::from("/d/2024010100")));
        assert!(!registry.consider(PathBuf::from("/other/2024010100")));
        assert_eq!(registry.latest().unwrap().path(), Path::new("/d/2024010100"));
    }

    #[test]
    fn non_dataset_names_are_ignored() {
        let mut registry = DatasetRegistry::new();
        assert!(!registry.consider(PathBuf::from("/d/readme.txt")));
        assert!(registry.latest().is_none());
    }

    #[test]
    fn invalidate_only_matches_current_path() {
        let mut registry = DatasetRegistry::new();
        registry.consider(PathBuf::from("/d/2024010100"));

        assert!(!registry.invalidate_if_current(Path::new("/d/2023123118")));
        assert!(registry.latest().is_some());

        assert!(registry.invalidate_if_current(Path::new("/d/2024010100")));
        assert!(registry.latest().is_none());
    }

    #[test]
    fn bootstrap_picks_newest_valid_entry() {
        let temp = tempfile::tempdir().unwrap();
        for name in ["2024010100", "2024010106", "notes.txt"] {
            fs::write(temp.path().join(name), b"").unwrap();
        }

        let mut registry = DatasetRegistry::new();
        let latest = registry.bootstrap(temp.path()).unwrap().unwrap();
        assert_eq!(latest.model_name(), "2024010106");
    }

    #[test]
    fn bootstrap_with_no_datasets_holds_none() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), b"").unwrap();

        let mut registry = DatasetRegistry::new();
        assert!(registry.bootstrap(temp.path()).unwrap().is_none());
    }
}
