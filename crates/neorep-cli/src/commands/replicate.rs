//! `neorep replicate`

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use std::path::Path;

use neorep_core::ProgressObserver;
use neorep_graph::Replicator;

use crate::output::{self, ProgressDisplay};

#[derive(Args)]
pub struct ReplicateArgs {
    /// Nodes per batch (relationships use half of this)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,

    /// Skip the confirmation prompt before clearing the target
    #[arg(short, long)]
    pub yes: bool,
}

pub async fn execute(args: ReplicateArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size as usize;
    }

    println!("{}", "Neo4j replication".bold());
    output::print_endpoints(&config.source, &config.target);
    println!("  {:<8} {}", "Batch:".bold(), config.batch_size);
    println!();

    let replicator = Replicator::connect(&config)
        .await
        .context("Failed to set up database clients")?;

    println!("{}", "Testing connections...".bold());
    let status = replicator.test_connections().await;
    output::print_connection_status(&status);
    if !status.all_ok() {
        bail!("Connection test failed; nothing was changed");
    }
    println!();

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "All data in {} will be deleted. Continue?",
                config.target.endpoint()
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("{}", "Aborted.".dimmed());
            return Ok(());
        }
    }

    let mut display = ProgressDisplay::new();
    let observer: &mut dyn ProgressObserver = &mut display;
    let result = replicator.replicate(Some(observer)).await;
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            display.abandon();
            return Err(e).context("Replication failed; the target may be partially written");
        }
    };
    drop(display);

    output::print_report(&report);
    Ok(())
}
