use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hourly_predictor::config::ConfigLoader;
use hourly_predictor::error::HourlyError;
use hourly_predictor::executor::SystemExecutor;
use hourly_predictor::publish::SitePublisher;
use hourly_predictor::reconcile::Reconciler;
use hourly_predictor::runner::RunPolicy;
use hourly_predictor::scenario::ScenarioStore;

/// One-shot variant of the daemon: a single sweep over every scenario
/// against the newest dataset on disk, tolerating individual failed runs,
/// then exit. Suitable for cron.
#[derive(Parser)]
#[command(name = "hourly-once")]
#[command(about = "Run every scenario once against the newest dataset and exit")]
#[command(version, author)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(hourly) = report.downcast_ref::<HourlyError>() {
            if matches!(
                hourly,
                HourlyError::MissingConfig
                    | HourlyError::ConfigRead(_)
                    | HourlyError::ConfigParse(_)
            ) {
                return ExitCode::from(2);
            }
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;

    let scenarios = ScenarioStore::new(config.scenarios_dir.clone().into_std_path_buf());
    let publisher = SitePublisher::new(
        config.web_dir.clone(),
        config.placeholder_page.clone(),
        config.ready_page.clone(),
    );
    let executor = SystemExecutor::new(config.predictor.clone().into_std_path_buf());

    let mut reconciler = Reconciler::new(scenarios, publisher, executor, RunPolicy::BestEffort);
    reconciler
        .bootstrap(config.datasets_dir.as_std_path())
        .into_diagnostic()?;

    info!("sweep complete");
    Ok(())
}
