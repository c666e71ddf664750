use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use task_coordination::{CodingTask, HeuristicClassifier, RelevantFile, TaskExecutionContext};
use task_engine::{EngineConfig, TaskEngine};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "task-engine", version, about = "Run coding tasks through an execution strategy")]
struct Cli {
    /// TOML config file; environment overrides still apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute a task and print the result as JSON.
    Run {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// Relevant file to include as context (repeatable).
        #[arg(long = "file")]
        files: Vec<PathBuf>,
        /// Force a strategy (e.g. `single_shot`, `Iterative`, `multi-agent`).
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Classify a description and print the verdict as JSON.
    Classify {
        #[arg(long)]
        description: String,
        /// Use only the local heuristic.
        #[arg(long)]
        offline: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => {
            let config = EngineConfig::from_env();
            config.validate().context("invalid configuration")?;
            config
        }
    };
    Ok(config)
}

fn read_context(files: &[PathBuf]) -> Result<TaskExecutionContext> {
    let mut relevant = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        relevant.push(RelevantFile::infer(path.to_string_lossy(), content));
    }
    Ok(TaskExecutionContext::new(relevant))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Classify {
            description,
            offline,
        } => {
            let result = if offline {
                HeuristicClassifier::new().classify(&description)
            } else {
                let engine = TaskEngine::from_config(&config)?;
                engine
                    .selector()
                    .classify_description(&description, &[])
                    .await
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Run {
            title,
            description,
            files,
            strategy,
        } => {
            let engine = TaskEngine::from_config(&config)?;
            let mut context = read_context(&files)?;
            let mut task = CodingTask::new(title, description);

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; cancelling task");
                    on_signal.cancel();
                }
            });

            info!(task_id = %task.id, files = files.len(), "running task");
            let result = engine
                .run(&mut task, &mut context, strategy.as_deref(), &cancel)
                .await
                .context("task execution failed")?;
            info!(task_id = %task.id, status = %task.status(), "task settled");

            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
