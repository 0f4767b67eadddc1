//! Dermaflow command-line entrypoint.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use dermaflow_core::compare::ModelComparator;
use dermaflow_core::config::load_config;
use dermaflow_core::deploy::{DeployRequest, Deployer, SageMakerDeployer};
use dermaflow_core::pipeline::Pipeline;
use dermaflow_core::tracking::{ExperimentTracker, FileTrackingStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dermaflow",
    version,
    about = "Multi-variant training pipeline with model comparison and registry promotion"
)]
struct Cli {
    /// Path to a TOML config file (defaults to ./dermaflow.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (overrides RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute the full pipeline: preprocess, train all variants, compare,
    /// promote.
    Run,
    /// Compare already-recorded candidates without training.
    Compare {
        /// Candidates as name=run_id pairs, in registration order.
        #[arg(long = "candidate", required = true)]
        candidates: Vec<String>,
    },
    /// Deploy a registered model version to the configured endpoint.
    Deploy {
        #[arg(long)]
        model_name: String,
        #[arg(long)]
        model_uri: String,
        #[arg(long)]
        model_version: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("loading configuration")?;

    match cli.command {
        Command::Run => {
            let pipeline = Pipeline::with_defaults(config).context("constructing pipeline")?;
            let outcome = pipeline.run().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.is_failed() {
                bail!("pipeline run failed");
            }
        }
        Command::Compare { candidates } => {
            let tracker = open_tracker(&config)?;
            let pairs = parse_candidates(&candidates)?;
            let comparator = ModelComparator::new(tracker);
            let result = comparator.compare(&pairs).context("comparing candidates")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Deploy {
            model_name,
            model_uri,
            model_version,
        } => {
            let tracker = open_tracker(&config)?;
            let request = DeployRequest {
                model_name,
                model_uri,
                experiment_name: config.experiment_name.clone(),
                model_version,
                endpoint_name: config.deploy.endpoint_name.clone(),
                instance_type: config.deploy.instance_type.clone(),
            };
            let deployer = SageMakerDeployer::new(config.deploy, tracker);
            let ok = deployer.deploy(&request).await.context("deploying model")?;
            println!("deployed: {ok}");
        }
    }

    Ok(())
}

fn open_tracker(
    config: &dermaflow_core::PipelineConfig,
) -> anyhow::Result<Arc<dyn ExperimentTracker>> {
    let store = FileTrackingStore::open(PathBuf::from(&config.tracking.uri).join("tracking.json"))
        .context("opening tracking store")?;
    Ok(Arc::new(store))
}

fn parse_candidates(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(name, run_id)| (name.to_string(), run_id.to_string()))
                .ok_or_else(|| anyhow::anyhow!("candidate '{entry}' is not name=run_id"))
        })
        .collect()
}
