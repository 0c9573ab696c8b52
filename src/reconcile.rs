use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::dataset::{DatasetRegistry, parse_dataset_time};
use crate::domain::ScenarioName;
use crate::error::HourlyError;
use crate::executor::PredictionExecutor;
use crate::publish::SitePublisher;
use crate::runner::{RunPolicy, ScenarioRunner};
use crate::scenario::ScenarioStore;

/// A change on one of the two watched directories, dispatched explicitly by
/// `match`. Scenario variants carry the directory entry name, dataset
/// variants the full path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    DatasetAdded(PathBuf),
    DatasetRemoved(PathBuf),
    ScenarioChanged(String),
    ScenarioRemoved(String),
}

/// The event loop state machine: owns the latest-dataset registry, consumes
/// filesystem events one at a time, and brings on-disk scenario outputs into
/// agreement with the current dataset and scenario definitions.
pub struct Reconciler<E: PredictionExecutor> {
    registry: DatasetRegistry,
    scenarios: ScenarioStore,
    publisher: SitePublisher,
    executor: E,
    policy: RunPolicy,
}

impl<E: PredictionExecutor> Reconciler<E> {
    pub fn new(
        scenarios: ScenarioStore,
        publisher: SitePublisher,
        executor: E,
        policy: RunPolicy,
    ) -> Self {
        Self {
            registry: DatasetRegistry::new(),
            scenarios,
            publisher,
            executor,
            policy,
        }
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.registry
    }

    /// Synchronous startup pass: adopt the newest dataset already on disk
    /// and, if there is one, run every scenario before entering the loop.
    pub fn bootstrap(&mut self, datasets_dir: &std::path::Path) -> Result<(), HourlyError> {
        match self.registry.bootstrap(datasets_dir)? {
            Some(dataset) => {
                debug!("initial dataset {}; running all", dataset.model_name());
                self.rerun_all();
            }
            None => debug!("no initial dataset"),
        }
        Ok(())
    }

    /// Processes one event to completion, including any full sweep it
    /// triggers. Never fails: every error is logged and absorbed so that the
    /// daemon outlives bad input.
    pub fn handle(&mut self, event: FsEvent) {
        match event {
            FsEvent::ScenarioChanged(filename) => match ScenarioName::from_filename(&filename) {
                Ok(name) => {
                    info!("scenario {name} modified: re-running");
                    self.run_scenario(&name);
                }
                Err(err) => debug!("{err}"),
            },
            FsEvent::ScenarioRemoved(filename) => match ScenarioName::from_filename(&filename) {
                Ok(name) => {
                    info!("scenario {name} removed: cleaning");
                    self.clean_scenario(&name);
                }
                Err(err) => debug!("{err}"),
            },
            FsEvent::DatasetAdded(path) => {
                let is_dataset = path
                    .file_name()
                    .and_then(|value| value.to_str())
                    .is_some_and(|name| parse_dataset_time(name).is_ok());
                if !is_dataset {
                    debug!("file added was not a dataset: {}", path.display());
                } else if self.registry.consider(path.clone()) {
                    info!("new dataset added: {}; re-running all", path.display());
                    self.rerun_all();
                } else {
                    warn!("dataset added was not newer: {}", path.display());
                }
            }
            FsEvent::DatasetRemoved(path) => {
                if self.registry.invalidate_if_current(&path) {
                    warn!("latest dataset was deleted");
                } else {
                    debug!("unrelated dataset file deleted: {}", path.display());
                }
            }
        }
    }

    /// Runs every validly named scenario against the current dataset.
    /// Necessary on every dataset change: all scenarios share one dataset,
    /// so a newer one invalidates every existing manifest's reference model.
    fn rerun_all(&mut self) {
        let names = match self.scenarios.names() {
            Ok(names) => names,
            Err(err) => {
                error!("cannot list scenarios: {err}");
                return;
            }
        };
        for name in names {
            info!("running {name}");
            self.run_scenario(&name);
        }
    }

    fn run_scenario(&mut self, name: &ScenarioName) {
        let Some(dataset) = self.registry.latest() else {
            warn!("not running scenario {name} - no dataset");
            return;
        };
        if !dataset.path().exists() {
            warn!("dataset race before scenario {name}, not running, expecting retry");
            return;
        }
        let dataset = dataset.clone();

        if let Err(err) = self.clean_scenario_inner(name) {
            error!("cannot clean stale output for {name}: {err}");
            return;
        }

        let definition = match self.scenarios.load(name) {
            Ok(definition) => definition,
            Err(err @ HourlyError::ScenarioParse { .. }) => {
                error!("bad scenario JSON: {err}");
                return;
            }
            Err(err) => {
                error!("cannot read scenario {name}: {err}");
                return;
            }
        };
        let template = definition.template();

        let runner = ScenarioRunner::new(&self.executor, &self.publisher, self.policy);
        match runner.run(name, &template, &dataset) {
            Ok(_) => info!("scenario run complete: {name}"),
            Err(err) if err.is_race() => {
                warn!("dataset race mid-scenario {name}, cleaning up and expecting retry");
                self.clean_scenario(name);
            }
            Err(err) => {
                error!("scenario run failed: {name}: {err}");
                self.clean_scenario(name);
            }
        }
    }

    fn clean_scenario(&self, name: &ScenarioName) {
        if let Err(err) = self.clean_scenario_inner(name) {
            error!("cannot clean scenario {name}: {err}");
        }
    }

    fn clean_scenario_inner(&self, name: &ScenarioName) -> Result<(), HourlyError> {
        self.publisher.clean(name)
    }
}
