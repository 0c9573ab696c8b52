use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::HourlyError;
use crate::reconcile::FsEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Added,
    Removed,
}

/// Watches the dataset and scenario directories and translates raw
/// notifications into `FsEvent` values for the reconciler.
pub struct DirWatcher {
    // Held for its Drop side effect: dropping stops the watches.
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    datasets_dir: PathBuf,
    scenarios_dir: PathBuf,
}

impl DirWatcher {
    pub fn new(datasets_dir: &Path, scenarios_dir: &Path) -> Result<Self, HourlyError> {
        let datasets_dir = datasets_dir
            .canonicalize()
            .map_err(|err| HourlyError::Watch(err.to_string()))?;
        let scenarios_dir = scenarios_dir
            .canonicalize()
            .map_err(|err| HourlyError::Watch(err.to_string()))?;

        let (tx, rx) = mpsc::channel();
        let mut watcher =
            notify::recommended_watcher(tx).map_err(|err| HourlyError::Watch(err.to_string()))?;
        watcher
            .watch(&datasets_dir, RecursiveMode::NonRecursive)
            .map_err(|err| HourlyError::Watch(err.to_string()))?;
        watcher
            .watch(&scenarios_dir, RecursiveMode::NonRecursive)
            .map_err(|err| HourlyError::Watch(err.to_string()))?;

        Ok(Self {
            _watcher: watcher,
            rx,
            datasets_dir,
            scenarios_dir,
        })
    }

    /// Blocks for the next notification and maps it to reconciler events.
    /// An empty vec means the notification was irrelevant; `Err` means the
    /// watch channel is gone and the loop must stop.
    pub fn recv(&self) -> Result<Vec<FsEvent>, HourlyError> {
        let result = self
            .rx
            .recv()
            .map_err(|err| HourlyError::Watch(err.to_string()))?;
        match result {
            Ok(event) => Ok(classify(&event, &self.datasets_dir, &self.scenarios_dir)),
            Err(err) => {
                warn!("watch notification error: {err}");
                Ok(Vec::new())
            }
        }
    }
}

/// Maps one raw notification to zero or more reconciler events. Only
/// completed writes (close-after-write) and renames-in count as additions:
/// a bare create or an in-progress write names a file whose content is not
/// yet trustworthy, and acting on it would run a sweep against a partial
/// dataset. Deletions and renames-out count as removals; everything outside
/// the two watched directories is dropped.
pub fn classify(event: &Event, datasets_dir: &Path, scenarios_dir: &Path) -> Vec<FsEvent> {
    let directed: Vec<(&PathBuf, Direction)> = match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write))
        | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|path| (path, Direction::Added))
            .collect(),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|path| (path, Direction::Removed))
            .collect(),
        // A rename observed as one event: first path left, second arrived.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
            .paths
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let direction = if index == 0 {
                    Direction::Removed
                } else {
                    Direction::Added
                };
                (path, direction)
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut out = Vec::new();
    for (path, direction) in directed {
        if path.parent() == Some(datasets_dir) {
            out.push(match direction {
                Direction::Added => FsEvent::DatasetAdded(path.clone()),
                Direction::Removed => FsEvent::DatasetRemoved(path.clone()),
            });
        } else if path.parent() == Some(scenarios_dir) {
            let Some(filename) = path.file_name().and_then(|value| value.to_str()) else {
                continue;
            };
            out.push(match direction {
                Direction::Added => FsEvent::ScenarioChanged(filename.to_string()),
                Direction::Removed => FsEvent::ScenarioRemoved(filename.to_string()),
            });
        } else {
            debug!("ignoring event outside watched directories: {}", path.display());
        }
    }
    out
}
