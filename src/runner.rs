use std::fs;

use chrono::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dataset::Dataset;
use crate::domain::{GeoPoint, ScenarioName, TimeParts};
use crate::error::HourlyError;
use crate::executor::{PredictionExecutor, PredictionRequest};
use crate::publish::{Manifest, PredictionRecord, SitePublisher};
use crate::scenario::ScenarioTemplate;

/// One week of hourly launch times per batch.
pub const RUNS_PER_BATCH: usize = 24 * 7;

/// How a batch reacts to a single failed run. A `DatasetRace` aborts the
/// whole batch under either policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPolicy {
    /// Any failed run aborts the batch. Used by the reactive daemon, where
    /// cleanup and a later rerun are cheap.
    Strict,
    /// Failed runs are logged and skipped; the manifest is published with
    /// whatever completed. Used by the one-shot sweep.
    BestEffort,
}

/// Drives a full weekly batch for one scenario against one dataset.
pub struct ScenarioRunner<'a, E: PredictionExecutor> {
    executor: &'a E,
    publisher: &'a SitePublisher,
    policy: RunPolicy,
}

impl<'a, E: PredictionExecutor> ScenarioRunner<'a, E> {
    pub fn new(executor: &'a E, publisher: &'a SitePublisher, policy: RunPolicy) -> Self {
        Self {
            executor,
            publisher,
            policy,
        }
    }

    /// Runs the 168 launch times in order, accumulating the manifest in
    /// memory, and publishes only on completion. On any error nothing is
    /// written; the caller owns cleanup and retry.
    pub fn run(
        &self,
        name: &ScenarioName,
        template: &ScenarioTemplate,
        dataset: &Dataset,
    ) -> Result<Manifest, HourlyError> {
        let batch_dir = self.publisher.begin(name)?;
        let mut manifest = Manifest::new(template.clone(), dataset.model_name().to_string());

        for hour in 0..RUNS_PER_BATCH {
            let launch_time = dataset.at() + Duration::hours(hour as i64);
            debug!("running prediction {hour} ({launch_time})");

            let run_id = Uuid::new_v4().to_string();
            let run_dir = batch_dir.join(&run_id);
            let outcome = fs::create_dir(run_dir.as_std_path())
                .map_err(|err| HourlyError::Filesystem(err.to_string()))
                .and_then(|()| {
                    self.executor.run(&PredictionRequest {
                        template,
                        launch_time,
                        dataset,
                        run_dir: run_dir.as_std_path(),
                    })
                });

            match outcome {
                Ok(landing) => {
                    manifest.predictions.insert(
                        run_id,
                        PredictionRecord {
                            landing_location: GeoPoint {
                                latitude: landing.latitude,
                                longitude: landing.longitude,
                                altitude: landing.altitude,
                            },
                            landing_time: TimeParts::from(landing.time),
                            launch_time: TimeParts::from(launch_time),
                        },
                    );
                }
                Err(err) if err.is_race() => return Err(err),
                Err(err) => match self.policy {
                    RunPolicy::Strict => return Err(err),
                    RunPolicy::BestEffort => {
                        warn!("prediction {hour} for {name} failed, continuing: {err}");
                    }
                },
            }
        }

        self.publisher.publish(name, &manifest)?;
        Ok(manifest)
    }
}
