//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use neorep_core::ReplicationConfig;
use tracing::debug;

pub mod connection;
pub mod replicate;
pub mod status;
pub mod verify;

/// Neo4j graph replicator - copy one database into another
#[derive(Parser)]
#[command(name = "neorep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the TOML config file (defaults to ./neorep.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replace the target database with a copy of the source
    Replicate(replicate::ReplicateArgs),

    /// Test connections to both databases
    Test,

    /// Compare source and target after a run
    Verify,

    /// Show node and relationship counts of both databases
    Status,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.config.as_deref();

        match self.command {
            Commands::Replicate(args) => replicate::execute(args, config).await,
            Commands::Test => connection::execute(config).await,
            Commands::Verify => verify::execute(config).await,
            Commands::Status => status::execute(config).await,
        }
    }
}

/// Load the layered configuration: file, environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ReplicationConfig> {
    let config = ReplicationConfig::load(path).context("Failed to load configuration")?;
    debug!(
        source = %config.source.endpoint(),
        target = %config.target.endpoint(),
        batch_size = config.batch_size,
        "Configuration loaded"
    );
    Ok(config)
}
