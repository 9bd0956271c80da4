//! msaflow command-line entry point.
//!
//! `run` performs the whole sequence. The other subcommands expose each stage
//! on its own, for platforms that schedule provisioning and launch as separate
//! tasks.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use msaflow::config::{RuntimeConfig, EXECUTION_TOKEN_VAR};
use msaflow::events::LoggingEventSink;
use msaflow::metadata::WorkflowMetadata;
use msaflow::observability::{init_tracing, LogFormat};
use msaflow::params::{ParamSchema, ParameterSet};
use msaflow::pipeline::WorkflowSequencer;
use msaflow::platform::VolumeHandle;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "msaflow")]
#[command(about = "Provision, stage and launch nf-core/multiplesequencealign", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults to $MSAFLOW_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision, stage and launch
    Run {
        /// Workflow parameters (JSON object)
        #[arg(short, long)]
        params: PathBuf,
    },

    /// Provision the shared volume and print its name
    Provision,

    /// Stage the working tree into the shared mount
    Stage,

    /// Launch the pipeline on an existing volume
    Launch {
        /// Volume name returned by `provision`
        #[arg(short, long)]
        volume: String,

        /// Workflow parameters (JSON object)
        #[arg(short, long)]
        params: PathBuf,
    },

    /// Print the engine command line without running it
    Command {
        /// Volume name returned by `provision`
        #[arg(short, long)]
        volume: String,

        /// Workflow parameters (JSON object)
        #[arg(short, long)]
        params: PathBuf,
    },

    /// Print the workflow metadata and parameter schema
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run { params } => {
            let report = sequencer(config)?.run(&load_params(&params)?).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Provision => {
            println!("{}", sequencer(config)?.provision().await?);
        }
        Commands::Stage => {
            let report = sequencer(config)?.stage().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Launch { volume, params } => {
            let report = sequencer(config)?
                .launch(&VolumeHandle::new(volume), &load_params(&params)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Command { volume, params } => {
            let invocation =
                sequencer(config)?.command(&VolumeHandle::new(volume), &load_params(&params)?)?;
            println!("{}", invocation.command_line());
        }
        Commands::Schema => {
            println!("{}", WorkflowMetadata::multiple_sequence_align().to_json()?);
        }
    }

    Ok(())
}

fn sequencer(config_path: Option<&Path>) -> Result<WorkflowSequencer> {
    let config = match config_path {
        Some(path) => RuntimeConfig::from_json_file(path)?
            .with_execution_token(std::env::var(EXECUTION_TOKEN_VAR).ok()),
        None => RuntimeConfig::from_env()?,
    };
    Ok(WorkflowSequencer::from_config(config)?
        .with_event_sink(Arc::new(LoggingEventSink::default())))
}

fn load_params(path: &Path) -> Result<ParameterSet> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading parameters from {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(ParameterSet::from_json(
        Arc::new(ParamSchema::multiple_sequence_align()),
        &value,
    )?)
}
