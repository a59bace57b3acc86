//! Tollgate daemon - reconciles approval tasks held in memory.

#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tollgate_config::Config;
use tollgate_controller::prelude::*;
use tollgate_core::ApprovalTask;
use tollgate_telemetry::{LogConfig, setup_logging};

/// Tollgate - multi-party approval gate
#[derive(Parser)]
#[command(name = "tollgated")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "TOLLGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile tasks until every one is approved, rejected or timed out
    Run {
        /// JSON file holding an array of approval tasks
        #[arg(short, long)]
        tasks: PathBuf,

        /// Make a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Build a new task from run parameters and print it
    Bootstrap {
        /// Task name
        #[arg(short, long)]
        name: String,

        /// JSON file holding an array of `{name, value}` parameters
        #[arg(short, long)]
        params: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    setup_logging(&LogConfig::from(&resolved.config.logging))
        .context("failed to set up logging")?;
    for file in &resolved.loaded_files {
        info!(path = %file, "Loaded configuration file");
    }
    let config = resolved.config;

    match cli.command {
        Commands::Run { tasks, once } => run(&config, &tasks, once).await,
        Commands::Bootstrap { name, params } => bootstrap(&name, &params),
    }
}

async fn run(config: &Config, path: &Path, once: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let tasks: Vec<ApprovalTask> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;

    let store = MemoryStore::new().shared();
    for task in tasks {
        store.create(task).await?;
    }

    let reconciler = Reconciler::new(Arc::clone(&store), Arc::new(SystemClock))
        .with_timeout(config.approval.default_timeout());

    loop {
        let mut next: Option<Duration> = None;
        for (key, outcome) in reconciler.reconcile_all().await? {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(task = %key, error = %e, "Reconcile failed");
                    next = Some(Duration::ZERO);
                    continue;
                },
            };
            info!(task = %key, state = %outcome.state, "Reconciled");
            if let Some(after) = outcome.requeue_after {
                next = Some(next.map_or(after, |n| n.min(after)));
            }
        }

        match next {
            Some(after) if !once => {
                info!(seconds = after.as_secs(), "Waiting for next deadline");
                // Land just past the deadline so the timeout check fires.
                tokio::time::sleep(after.saturating_add(Duration::from_secs(1))).await;
            },
            _ => break,
        }
    }

    let out = serde_json::to_string_pretty(&store.list().await?)?;
    println!("{out}");
    Ok(())
}

fn bootstrap(name: &str, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let params: Vec<Param> =
        serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;

    let task = TaskParams::from_params(&params)?.into_task(name, chrono::Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}
