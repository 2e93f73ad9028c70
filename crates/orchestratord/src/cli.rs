//! Command-line surface for the orchestrator daemon.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "orchestratord", version, about = "Multi-agent fleet orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Decompose a requirements brief into a validated, dependency-ordered
    /// execution plan and print it without running anything.
    Plan {
        /// Path to a file containing the requirements brief.
        #[arg(long)]
        requirements: PathBuf,

        /// Optional extra project context to hand the planner.
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Run the full fleet: plan, enqueue, spawn workers per specialty, and
    /// merge each agent's branch back once its queue has drained.
    Run {
        /// Git repository the fleet operates on.
        #[arg(long)]
        project: PathBuf,

        /// Path to a file containing the requirements brief.
        #[arg(long)]
        requirements: PathBuf,

        /// Branch agent work is merged into.
        #[arg(long, default_value = "main")]
        target_branch: String,

        /// Cap on concurrently running agents.
        #[arg(long)]
        max_agents: Option<u32>,

        /// Skip the quality-gate pipeline before merging (not recommended).
        #[arg(long)]
        no_quality_gates: bool,
    },

    /// Report queue depth and pending-task counts from the shared backend.
    Status {
        /// Redis connection string; overrides `REDIS_URL`.
        #[arg(long)]
        redis_url: Option<String>,
    },
}
