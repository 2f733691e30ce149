//! # FlowClaw — Workflow Automation Engine
//!
//! Runs workflow definitions once, or keeps them on a recurring schedule.
//!
//! Usage:
//!   flowclaw run deploy.toml                    # One manual execution
//!   flowclaw run deploy.toml --input '{"v":2}'  # With trigger input
//!   flowclaw serve ~/.flowclaw/workflows        # Schedule every ACTIVE workflow
//!   flowclaw history wf-deploy --limit 20       # Recent executions
//!   flowclaw adapters                           # Registered tools

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowclaw_adapters::AdapterRegistry;
use flowclaw_core::config::expand_path;
use flowclaw_core::types::{Workflow, WorkflowStatus};
use flowclaw_core::FlowClawConfig;
use flowclaw_scheduler::{EventBroadcaster, ExecutionEngine, RetryPolicy, Scheduler, open_store};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowclaw", version, about = "⚙️ FlowClaw — Workflow Automation Engine")]
struct Cli {
    /// Config file (default: ~/.flowclaw/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a workflow once and print the result
    Run {
        /// Workflow definition (.toml or .json)
        file: PathBuf,
        /// Trigger input as JSON
        #[arg(long)]
        input: Option<String>,
    },
    /// Schedule every ACTIVE workflow in a directory and run until Ctrl-C
    Serve {
        /// Directory of workflow definitions
        dir: String,
    },
    /// Show recent executions of a workflow
    History {
        workflow_id: String,
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// List registered adapters
    Adapters,
}

/// A workflow definition file: the workflow plus its schedule.
#[derive(Debug, Deserialize)]
struct WorkflowFile {
    #[serde(flatten)]
    workflow: Workflow,
    /// Seconds between scheduled runs.
    #[serde(default)]
    interval_secs: Option<u64>,
}

fn load_workflow_file(path: &Path) -> Result<WorkflowFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let file = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?,
        _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
    };
    Ok(file)
}

/// Every `.toml`/`.json` definition in `dir`, sorted by file name.
fn load_workflow_dir(dir: &Path) -> Result<Vec<(PathBuf, WorkflowFile)>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| matches!(p.extension().and_then(|e| e.to_str()), Some("toml" | "json")))
        .collect();
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match load_workflow_file(&path) {
            Ok(file) => files.push((path, file)),
            Err(e) => tracing::warn!("⚠️ Skipping {}: {:#}", path.display(), e),
        }
    }
    Ok(files)
}

struct Runtime {
    config: FlowClawConfig,
    registry: Arc<AdapterRegistry>,
    engine: Arc<ExecutionEngine>,
}

impl Runtime {
    fn build(config: FlowClawConfig) -> Result<Self> {
        let registry = Arc::new(AdapterRegistry::from_config(&config.adapters));
        let store = open_store(&config.store)?;
        let events = Arc::new(EventBroadcaster::from_config(&config.notify));
        let engine = ExecutionEngine::new(registry.clone(), store, events)
            .with_retry_policy(RetryPolicy::from_config(&config.engine));
        Ok(Self {
            config,
            registry,
            engine: Arc::new(engine),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "flowclaw=debug,flowclaw_scheduler=debug,flowclaw_adapters=debug,flowclaw_core=debug"
    } else {
        "flowclaw=info,flowclaw_scheduler=info,flowclaw_adapters=info,flowclaw_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => FlowClawConfig::load_from(&expand_path(path))?,
        None => FlowClawConfig::load()?,
    };
    let rt = Runtime::build(config)?;

    match cli.command {
        Command::Run { file, input } => {
            let def = load_workflow_file(&file)?;
            let trigger = match input {
                Some(raw) => serde_json::json!({
                    "source": "manual",
                    "input": serde_json::from_str::<serde_json::Value>(&raw)
                        .context("--input must be valid JSON")?,
                }),
                None => serde_json::json!({ "source": "manual" }),
            };
            let result = rt.engine.trigger(&def.workflow, trigger).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                anyhow::bail!(
                    "workflow '{}' failed: {}",
                    def.workflow.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Command::Serve { dir } => {
            let dir = expand_path(&dir);
            let scheduler = Scheduler::from_config(rt.engine.clone(), &rt.config.scheduler);
            let default_interval = rt.config.scheduler.default_interval_secs;

            for (path, def) in load_workflow_dir(&dir)? {
                if def.workflow.status != WorkflowStatus::Active {
                    tracing::debug!("Skipping {} ({:?})", path.display(), def.workflow.status);
                    continue;
                }
                let secs = def.interval_secs.unwrap_or(default_interval);
                let id = def.workflow.id.clone();
                if let Err(e) = scheduler.schedule(&id, def.workflow, Duration::from_secs(secs)) {
                    tracing::warn!("⚠️ Could not schedule {}: {}", path.display(), e);
                }
            }

            let ids = scheduler.scheduled_ids();
            println!("⚙️ FlowClaw v{}", env!("CARGO_PKG_VERSION"));
            println!("   📂 Workflows: {}", dir.display());
            println!("   ⏰ Scheduled: {}", ids.len());
            for id in &ids {
                println!("      • {id}");
            }
            println!("   🔌 Adapters:  {}", rt.registry.names().join(", "));
            println!();

            tokio::signal::ctrl_c().await?;
            println!("\n👋 Shutting down...");
            scheduler.shutdown();
        }
        Command::History { workflow_id, limit } => {
            let executions = rt.engine.store().list_executions(&workflow_id, limit).await?;
            if executions.is_empty() {
                println!("No executions for '{workflow_id}'.");
            }
            for e in executions {
                println!(
                    "{}  {:<9}  {}  {}",
                    e.created_at.format("%Y-%m-%d %H:%M:%S"),
                    e.status.as_str(),
                    e.id,
                    e.error.unwrap_or_default()
                );
            }
        }
        Command::Adapters => {
            let names = rt.registry.names();
            println!("🔌 {} adapter(s) registered", names.len());
            for name in names {
                println!("   • {name}");
            }
        }
    }

    Ok(())
}
