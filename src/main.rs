//! Minimal CLI entry point: a single `run` subcommand that drives one
//! workflow run to completion against a real Gateway server, for manual
//! testing of the swarm core (SPEC_FULL §2 "Crate Shape"). Task-graph
//! construction is not this binary's job — see
//! [`jobmon_swarm::infrastructure::bootstrap`].

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use jobmon_swarm::adapters::{HttpGateway, PidDistributorProbe};
use jobmon_swarm::infrastructure::bootstrap::WorkflowFixture;
use jobmon_swarm::infrastructure::config::ConfigLoader;
use jobmon_swarm::infrastructure::logging;
use jobmon_swarm::services::{Orchestrator, OrchestratorConfig};

#[derive(Parser)]
#[command(name = "jobmon-swarm", version, about = "Per-workflow-run swarm coordinator")]
struct Cli {
    /// Path to a `swarm.yaml` config file. Falls back to defaults/env if absent.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow to completion.
    Run {
        /// JSON fixture describing the initial task graph.
        #[arg(long)]
        fixture: String,

        /// PID of the distributor process this run depends on.
        #[arg(long)]
        distributor_pid: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path).context("failed to load config file")?,
        None => ConfigLoader::load().context("failed to load configuration")?,
    };

    let _logger_guard = logging::init(&config.logging).context("failed to initialize logging")?;

    match cli.command {
        Commands::Run { fixture, distributor_pid } => run(config, &fixture, distributor_pid).await,
    }
}

async fn run(config: jobmon_swarm::domain::models::SwarmConfig, fixture_path: &str, distributor_pid: i32) -> Result<()> {
    let fixture = WorkflowFixture::load(fixture_path).context("failed to load workflow fixture")?;
    let state = fixture.into_state().context("failed to build initial swarm state")?;
    let workflow_run_id = state.workflow_run_id;

    let gateway = Arc::new(HttpGateway::new(&config.gateway, workflow_run_id).context("failed to build gateway")?);
    let distributor = Arc::new(PidDistributorProbe::new(distributor_pid));
    let orchestrator_config = OrchestratorConfig::from(&config);

    let orchestrator = Orchestrator::new(gateway, distributor, state, orchestrator_config);

    tracing::info!(workflow_run_id, "starting swarm run");
    let result = orchestrator.run().await.context("workflow run failed")?;

    tracing::info!(
        final_status = %result.final_status,
        done_count = result.done_count,
        failed_count = result.failed_count,
        total_tasks = result.total_tasks,
        elapsed_secs = result.elapsed_time.as_secs_f64(),
        "workflow run finished"
    );

    if result.failed_count > 0 {
        std::process::exit(1);
    }
    Ok(())
}
