//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use neorep_core::{GraphConfig, ProgressObserver, ProgressSnapshot, Stage};
use neorep_graph::{ConnectionStatus, GraphCounts, ReplicationReport, VerificationReport};

fn ok_or_fail(ok: bool) -> ColoredString {
    if ok {
        "✓".green()
    } else {
        "✗".red()
    }
}

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::Clearing => "Clearing target",
        Stage::Schema => "Copying constraints and indexes",
        Stage::Nodes => "Copying nodes",
        Stage::Relationships => "Copying relationships",
        Stage::Cleanup => "Removing correlation property",
        Stage::Complete => "Done",
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░")
}

/// Renders replication progress: a header per stage and a bar for the copy stages.
#[derive(Default)]
pub struct ProgressDisplay {
    stage: Option<Stage>,
    bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }

    fn update_bar(&self, processed: u64, total: u64) {
        if let Some(bar) = &self.bar {
            // Totals are read before the run and may be stale.
            if processed > total {
                bar.set_length(processed);
            }
            bar.set_position(processed);
        }
    }

    /// Clear any bar still on screen, e.g. after a failed run.
    pub fn abandon(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

impl ProgressObserver for ProgressDisplay {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) -> anyhow::Result<()> {
        if self.stage != Some(snapshot.stage) {
            self.finish_bar();
            self.stage = Some(snapshot.stage);

            let ordinal = snapshot.stage.ordinal();
            println!(
                "{} {}",
                format!("[{}/{}]", ordinal, Stage::ALL.len()).dimmed(),
                stage_title(snapshot.stage).bold()
            );

            self.bar = match snapshot.stage {
                Stage::Nodes => Some(ProgressBar::new(snapshot.total_nodes)),
                Stage::Relationships => Some(ProgressBar::new(snapshot.total_relationships)),
                _ => None,
            };
            if let Some(bar) = &self.bar {
                bar.set_style(bar_style());
            }
        }

        match snapshot.stage {
            Stage::Nodes => self.update_bar(snapshot.processed_nodes, snapshot.total_nodes),
            Stage::Relationships => {
                self.update_bar(snapshot.processed_relationships, snapshot.total_relationships)
            }
            _ => {}
        }
        Ok(())
    }
}

impl Drop for ProgressDisplay {
    fn drop(&mut self) {
        self.finish_bar();
    }
}

/// Print source and target endpoints.
pub fn print_endpoints(source: &GraphConfig, target: &GraphConfig) {
    println!("  {:<8} {}", "Source:".bold(), source.endpoint().cyan());
    println!("  {:<8} {}", "Target:".bold(), target.endpoint().yellow());
}

/// Print the outcome of the connection test.
pub fn print_connection_status(status: &ConnectionStatus) {
    println!("  {} Source", ok_or_fail(status.source));
    println!("  {} Target", ok_or_fail(status.target));
}

/// Print the summary of a completed run.
pub fn print_report(report: &ReplicationReport) {
    println!();
    println!("{}", "Replication complete".green().bold());
    println!("{}", "─".repeat(45));
    println!("  {:<28} {}", "Nodes deleted from target:", report.nodes_deleted);
    println!("  {:<28} {}", "Constraints created:", report.schema.constraints_created);
    println!("  {:<28} {}", "Indexes created:", report.schema.indexes_created);
    if report.schema.already_existing > 0 {
        println!("  {:<28} {}", "Schema already present:", report.schema.already_existing);
    }
    if report.schema.skipped > 0 {
        println!("  {:<28} {}", "Schema skipped:", report.schema.skipped.to_string().yellow());
    }
    if report.schema.failed > 0 {
        println!("  {:<28} {}", "Schema failed:", report.schema.failed.to_string().red());
    }
    println!("  {:<28} {}", "Nodes copied:", report.nodes_copied.to_string().bold());
    println!(
        "  {:<28} {}",
        "Relationships copied:",
        report.relationships_created.to_string().bold()
    );
    let unresolved = report.relationships_copied.saturating_sub(report.relationships_created);
    if unresolved > 0 {
        println!(
            "  {:<28} {}",
            "Relationships unresolved:",
            unresolved.to_string().yellow()
        );
    }
    println!("  {:<28} {}", "Correlation ids removed:", report.correlation_removed);
    if report.source_id_collisions > 0 {
        println!(
            "  {:<28} {}",
            "Source ids overwritten:",
            report.source_id_collisions.to_string().yellow()
        );
    }
    println!(
        "  {:<28} {:.1}s",
        "Elapsed:",
        report.elapsed_ms as f64 / 1000.0
    );
}

/// Print node and relationship counts side by side.
pub fn print_counts(source: &GraphCounts, target: &GraphCounts) {
    println!("  {:<16} {:>12} {:>12}", "", "Source".bold(), "Target".bold());
    println!("  {}", "─".repeat(42));
    println!("  {:<16} {:>12} {:>12}", "Nodes", source.nodes, target.nodes);
    println!(
        "  {:<16} {:>12} {:>12}",
        "Relationships", source.relationships, target.relationships
    );
}

/// Print a verification report.
pub fn print_verification(report: &VerificationReport) {
    print_counts(&report.source, &report.target);
    println!();
    println!("  {} Node counts match", ok_or_fail(report.nodes_match()));
    println!("  {} Relationship counts match", ok_or_fail(report.relationships_match()));
    println!(
        "  {} No correlation property left ({} remaining)",
        ok_or_fail(report.leftover_correlation == 0),
        report.leftover_correlation
    );
}
