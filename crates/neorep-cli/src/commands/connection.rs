//! `neorep test`

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;

use neorep_graph::Replicator;

use crate::output;

pub async fn execute(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;

    println!("{}", "Testing connections...".bold());
    output::print_endpoints(&config.source, &config.target);
    println!();

    let replicator = Replicator::connect(&config)
        .await
        .context("Failed to set up database clients")?;
    let status = replicator.test_connections().await;
    output::print_connection_status(&status);

    if !status.all_ok() {
        bail!("Connection test failed");
    }
    println!("\n{}", "Both databases are reachable.".green());
    Ok(())
}
