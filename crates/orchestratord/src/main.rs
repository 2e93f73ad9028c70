//! Fleet orchestrator daemon entrypoint.

mod cli;
mod config;
mod fleet;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::Settings::from_env().context("loading settings from environment")?;

    match cli.command {
        Command::Plan { requirements, context } => {
            let requirements = std::fs::read_to_string(&requirements)
                .with_context(|| format!("reading {}", requirements.display()))?;
            let context = context
                .map(|path| std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display())))
                .transpose()?;

            let llm = fleet::build_llm_client(&settings);
            fleet::plan_only(llm, &requirements, context.as_deref()).await
        }
        Command::Run {
            project,
            requirements,
            target_branch,
            max_agents,
            no_quality_gates,
        } => {
            let settings = config::apply_overrides(settings, max_agents, None);
            let requirements = std::fs::read_to_string(&requirements)
                .with_context(|| format!("reading {}", requirements.display()))?;

            let llm = fleet::build_llm_client(&settings);
            let queue = fleet::build_queue(&settings).await?;
            let locks = fleet::build_locks(&settings).await?;

            fleet::run_fleet(&project, &requirements, &target_branch, !no_quality_gates, llm, queue, locks).await
        }
        Command::Status { redis_url } => {
            let settings = config::apply_overrides(settings, None, redis_url);
            let queue = fleet::build_queue(&settings).await?;

            let mut depths = Vec::new();
            for specialty in orch_core::Specialty::all() {
                depths.push(format!("{specialty}={}", queue.queue_depth(specialty).await));
            }
            println!("pending: {}", queue.pending_count().await);
            println!("queue depths: {}", depths.join(", "));
            Ok(())
        }
    }
}
