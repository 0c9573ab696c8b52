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
use hourly_predictor::watch::DirWatcher;

#[derive(Parser)]
#[command(name = "hourlyd")]
#[command(about = "Reactive hourly prediction daemon: reruns scenarios whenever datasets or definitions change")]
#[command(version, author)]
struct Cli {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(hourly) = report.downcast_ref::<HourlyError>() {
            return ExitCode::from(map_exit_code(hourly));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HourlyError) -> u8 {
    match error {
        HourlyError::MissingConfig
        | HourlyError::ConfigRead(_)
        | HourlyError::ConfigParse(_) => 2,
        HourlyError::Watch(_) => 3,
        _ => 1,
    }
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

    // Watch before the bootstrap scan so nothing slips between the two.
    let watcher = DirWatcher::new(
        config.datasets_dir.as_std_path(),
        scenarios.dir(),
    )
    .into_diagnostic()?;

    let mut reconciler = Reconciler::new(scenarios, publisher, executor, RunPolicy::Strict);
    reconciler
        .bootstrap(config.datasets_dir.as_std_path())
        .into_diagnostic()?;

    info!("watching {} and {}", config.datasets_dir, config.scenarios_dir);
    loop {
        let events = watcher.recv().into_diagnostic()?;
        for event in events {
            reconciler.handle(event);
        }
    }
}
