//! `neorep verify`

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;

use neorep_graph::Replicator;

use crate::output;

pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let replicator = Replicator::connect(&config)
        .await
        .context("Failed to set up database clients")?;

    println!("{}", "Verifying replica".bold());
    println!("{}", "─".repeat(45));
    let report = replicator.verify().await.context("Failed to read counts")?;
    output::print_verification(&report);

    if !report.is_consistent() {
        bail!("Target does not match source");
    }
    println!("\n{}", "Target matches source.".green());
    Ok(())
}
