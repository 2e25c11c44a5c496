//! Cutover command line
//!
//! Drives a gateway cutover migration: `init` validates and records a new
//! migration, `execute` walks it to the end (resuming where a previous run
//! stopped), `status` and `list` read the state file.

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use cutover_common::telemetry::LogFormat;

/// Live Kafka cutover through a gateway proxy
#[derive(Parser, Debug)]
#[command(name = "cutover", version, about, long_about = None)]
pub struct Cli {
    /// Migration state file
    #[arg(long, global = true, env = "CUTOVER_STATE_FILE", default_value = "migration-state.json")]
    pub state_file: PathBuf,

    /// Log output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the gateway and cluster link and record a new migration
    Init(commands::init::InitArgs),

    /// Run a migration to completion, resuming from its last state
    Execute(commands::execute::ExecuteArgs),

    /// Show one migration
    Status(commands::status::StatusArgs),

    /// List every migration in the state file
    List,
}

impl Cli {
    /// Run the selected command until it finishes or `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        match self.command {
            Commands::Init(args) => commands::init::run(args, &self.state_file, &cancel).await,
            Commands::Execute(args) => {
                commands::execute::run(args, &self.state_file, &cancel).await
            }
            Commands::Status(args) => commands::status::status(args, &self.state_file),
            Commands::List => commands::status::list(&self.state_file),
        }
    }
}
