use anyhow::Context;
use clap::Parser;
use run_history_export::{
    config::{Config, ObservabilityConfig},
    vault::FileVault,
    ExportPipeline,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Instrument;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "run-history-export", version)]
#[command(about = "Export process-run history of an automation workspace to CSV", long_about = None)]
struct Cli {
    /// Configuration file (default: config/run-export.toml)
    #[arg(short, long, env = "RUN_EXPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory receiving combined.csv
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Also persist the runs to the database
    #[arg(long)]
    with_database: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.observability);

    let job_id = Uuid::new_v4();
    let span = tracing::info_span!("export_job", %job_id);
    tracing::info!(
        parent: &span,
        version = env!("CARGO_PKG_VERSION"),
        workspace_id = %config.workspace.id,
        output = %config.export.output_path().display(),
        database = config.database.enabled,
        "Starting run history export"
    );

    let store = FileVault::new(config.vault.path.clone());
    let pipeline = ExportPipeline::new(config);

    match pipeline.run(&store).instrument(span.clone()).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(
                parent: &span,
                stage = %e.stage,
                error_code = e.error_code(),
                error = %e.source,
                "Export job failed"
            );
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("could not build configuration")?;

    if let Some(dir) = &cli.output_dir {
        config.export.output_dir = dir.clone();
    }
    if cli.with_database {
        config.database.enabled = true;
    }
    if cli.log_json {
        config.observability.json_logs = true;
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("run_history_export={}", observability.log_level))
    });
    let json = observability.json_logs;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
