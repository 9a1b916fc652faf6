use std::path::PathBuf;
use std::process::ExitCode;

use catalog_common::credentials::Credentials;
use catalog_common::types::InferenceProvider;
use clap::Parser;

use catalog_engine::orchestrator::{self, PipelineContext, StageSelection};
use catalog_engine::{config, secrets};

/// Discover, normalize, and synchronize AI model catalogs into the
/// working and production tables.
#[derive(Debug, Parser)]
#[command(name = "catalog-engine", version)]
struct Cli {
    /// Provider pipeline to run: google, groq, or openrouter.
    provider: String,

    /// Run every auto-selected stage without prompting.
    #[arg(long)]
    auto_all: bool,

    /// Run specific stages by letter (e.g. --scripts A B C).
    #[arg(long, num_args = 1..)]
    scripts: Vec<String>,

    /// Run an inclusive stage range (e.g. --range C G).
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    range: Vec<String>,

    /// Accepted for orchestration-script compatibility; environment
    /// bootstrapping is outside this binary.
    #[arg(long)]
    no_venv: bool,

    /// Configuration directory.
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,

    /// Override the outputs directory from pipeline.toml.
    #[arg(long)]
    outputs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let credentials = Credentials::from_env();
    init_tracing(credentials.non_interactive);

    tracing::info!(
        provider = %cli.provider,
        non_interactive = credentials.non_interactive,
        "Catalog engine starting"
    );
    if cli.no_venv {
        tracing::debug!("--no-venv accepted (environment bootstrapping is external)");
    }

    let Some(provider) = InferenceProvider::parse(&cli.provider) else {
        eprintln!("Unknown provider '{}'; expected google, groq, or openrouter", cli.provider);
        return ExitCode::FAILURE;
    };

    let config = match config::load_config(&cli.config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut credentials = credentials;
    secrets::resolve_api_keys(&mut credentials).await;

    let outputs_root = cli
        .outputs_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.pipeline.orchestrator.outputs_dir));

    let selection = StageSelection {
        auto_all: cli.auto_all,
        scripts: cli.scripts.clone(),
        range: match cli.range.as_slice() {
            [start, end] => Some((start.clone(), end.clone())),
            _ => None,
        },
    };

    let ctx = match PipelineContext::new(config, credentials, outputs_root).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Startup error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match orchestrator::run_provider(&ctx, provider, &selection).await {
        Ok(report) => {
            let rendered = orchestrator::render_run_report(&report);
            println!("{rendered}");
            if report.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// JSON logs under CI, human-readable otherwise; RUST_LOG overrides the
/// default info level either way.
fn init_tracing(non_interactive: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if non_interactive {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
