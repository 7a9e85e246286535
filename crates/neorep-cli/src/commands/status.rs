//! `neorep status`

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use neorep_graph::Replicator;

use crate::output;

pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let replicator = Replicator::connect(&config)
        .await
        .context("Failed to set up database clients")?;

    println!("{}", "Database status".bold());
    output::print_endpoints(&config.source, &config.target);
    println!();

    let (source, target) = replicator.counts().await.context("Failed to read counts")?;
    output::print_counts(&source, &target);
    Ok(())
}
