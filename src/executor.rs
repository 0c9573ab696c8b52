use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::dataset::Dataset;
use crate::domain::{GeoPoint, TimeParts};
use crate::error::HourlyError;
use crate::scenario::{AltitudeModel, ScenarioTemplate};

const INPUT_INI: &str = "scenario.ini";
const INPUT_JSON: &str = "scenario.json";
const OUTPUT_CSV: &str = "output.csv";
const LOG_TXT: &str = "log.txt";

/// One prediction: a scenario fragment launched at a fixed time against a
/// fixed dataset, scratch space in a fresh run directory.
#[derive(Debug)]
pub struct PredictionRequest<'a> {
    pub template: &'a ScenarioTemplate,
    pub launch_time: DateTime<Utc>,
    pub dataset: &'a Dataset,
    pub run_dir: &'a Path,
}

/// The final timestamp/latitude/longitude/altitude tuple emitted by the
/// predictor for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandingFingerprint {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// External-process boundary. One call runs one prediction; retry policy
/// belongs to the caller.
pub trait PredictionExecutor: Send + Sync {
    fn run(&self, request: &PredictionRequest<'_>) -> Result<LandingFingerprint, HourlyError>;
}

/// The per-run input handed to the predictor, with the launch time flattened
/// into calendar fields. Written twice: as the INI the process consumes and as
/// a JSON copy kept for audit.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct RunInput {
    launch_site: GeoPoint,
    altitude_model: AltitudeModel,
    launch_time: TimeParts,
}

impl RunInput {
    fn new(template: &ScenarioTemplate, launch_time: DateTime<Utc>) -> Self {
        Self {
            launch_site: template.launch_site,
            altitude_model: template.altitude_model,
            launch_time: TimeParts::from(launch_time),
        }
    }

    fn to_ini(&self) -> String {
        let mut lines = Vec::new();
        lines.push("[launch-site]".to_string());
        lines.push(format!("latitude = {}", self.launch_site.latitude));
        lines.push(format!("longitude = {}", self.launch_site.longitude));
        lines.push(format!("altitude = {}", self.launch_site.altitude));
        lines.push("[altitude-model]".to_string());
        lines.push(format!("ascent-rate = {}", self.altitude_model.ascent_rate));
        lines.push(format!("descent-rate = {}", self.altitude_model.descent_rate));
        lines.push(format!(
            "burst-altitude = {}",
            self.altitude_model.burst_altitude
        ));
        lines.push("[launch-time]".to_string());
        lines.push(format!("year = {}", self.launch_time.year));
        lines.push(format!("month = {}", self.launch_time.month));
        lines.push(format!("day = {}", self.launch_time.day));
        lines.push(format!("hour = {}", self.launch_time.hour));
        lines.push(format!("minute = {}", self.launch_time.minute));
        lines.push(format!("second = {}", self.launch_time.second));
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Runs the real predictor binary.
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    binary: PathBuf,
}

impl SystemExecutor {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl PredictionExecutor for SystemExecutor {
    fn run(&self, request: &PredictionRequest<'_>) -> Result<LandingFingerprint, HourlyError> {
        let input = RunInput::new(request.template, request.launch_time);

        let ini_path = request.run_dir.join(INPUT_INI);
        fs::write(&ini_path, input.to_ini())
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;

        let json = serde_json::to_vec(&input)
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        fs::write(request.run_dir.join(INPUT_JSON), json)
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;

        let output_path = request.run_dir.join(OUTPUT_CSV);
        let output_file = fs::File::create(&output_path)
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        let log_path = request.run_dir.join(LOG_TXT);
        let log_file = fs::File::create(&log_path)
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;

        debug!("launching predictor for {}", request.launch_time);
        let status = Command::new(&self.binary)
            .arg("-v")
            .arg(format!("-i{}", request.dataset.path().display()))
            .arg(format!("-s{}", request.dataset.epoch_seconds()))
            .arg(&ini_path)
            .stdout(Stdio::from(output_file))
            .stderr(Stdio::from(log_file))
            .status()
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;

        if !status.success() {
            // A non-zero exit with the dataset gone means an external actor
            // rotated it out mid-run, not a broken predictor.
            if !request.dataset.path().exists() {
                return Err(HourlyError::DatasetRace(request.dataset.path().to_path_buf()));
            }
            return Err(HourlyError::ProcessFailure {
                code: status.code().unwrap_or(-1),
                stderr_path: log_path,
            });
        }

        let stdout = fs::read_to_string(&output_path)
            .map_err(|err| HourlyError::Filesystem(err.to_string()))?;
        parse_landing(&stdout)
    }
}

/// Extracts the landing fingerprint from the captured predictor stdout: the
/// final non-empty line, four comma-separated numeric fields.
pub fn parse_landing(stdout: &str) -> Result<LandingFingerprint, HourlyError> {
    let last_line = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .ok_or_else(|| HourlyError::OutputParse("empty output".to_string()))?;

    let fields: Vec<f64> = last_line
        .split(',')
        .map(|field| field.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| HourlyError::OutputParse(last_line.to_string()))?;
    let &[timestamp, latitude, longitude, altitude] = fields.as_slice() else {
        return Err(HourlyError::OutputParse(last_line.to_string()));
    };

    let time = DateTime::from_timestamp(timestamp as i64, 0)
        .ok_or_else(|| HourlyError::OutputParse(last_line.to_string()))?;
    Ok(LandingFingerprint {
        time,
        latitude,
        longitude,
        altitude,
    })
}
