//! Replication stages and progress reporting.
//!
//! The orchestrator owns a [`ProgressTracker`] and emits an immutable
//! [`ProgressSnapshot`] to the caller's [`ProgressObserver`] after every stage
//! transition and after every page of nodes or relationships.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NeorepError, NeorepResult};

/// One phase of the replication pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Clearing,
    Schema,
    Nodes,
    Relationships,
    Cleanup,
    Complete,
}

impl Stage {
    /// All stages in the order the orchestrator runs them.
    pub const ALL: [Stage; 6] = [
        Stage::Clearing,
        Stage::Schema,
        Stage::Nodes,
        Stage::Relationships,
        Stage::Cleanup,
        Stage::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clearing => "clearing",
            Stage::Schema => "schema",
            Stage::Nodes => "nodes",
            Stage::Relationships => "relationships",
            Stage::Cleanup => "cleanup",
            Stage::Complete => "complete",
        }
    }

    /// 1-based position of the stage, used for "[n/6]" style output.
    pub fn ordinal(&self) -> usize {
        Stage::ALL.iter().position(|s| s == self).map(|i| i + 1).unwrap_or(0)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of replication progress.
///
/// Totals are read from the source before the run starts and are advisory:
/// a source mutated during the run can push processed counts past them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub total_nodes: u64,
    pub processed_nodes: u64,
    pub total_relationships: u64,
    pub processed_relationships: u64,
    pub stage: Stage,
}

impl ProgressSnapshot {
    pub fn new() -> Self {
        Self {
            total_nodes: 0,
            processed_nodes: 0,
            total_relationships: 0,
            processed_relationships: 0,
            stage: Stage::Clearing,
        }
    }

    /// Percentage of nodes copied, clamped to 100.
    pub fn node_percent(&self) -> f64 {
        percent(self.processed_nodes, self.total_nodes)
    }

    /// Percentage of relationships copied, clamped to 100.
    pub fn relationship_percent(&self) -> f64 {
        percent(self.processed_relationships, self.total_relationships)
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(processed: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (processed as f64 / total as f64 * 100.0).min(100.0)
}

/// Receives progress snapshots during a replication run.
///
/// Observers are called synchronously on the replication task. An observer
/// that returns `Err` aborts the run: the error surfaces from `replicate` as
/// [`NeorepError::Observer`]. Observers that only display progress should
/// always return `Ok(())`.
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) -> anyhow::Result<()>;
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressSnapshot) -> anyhow::Result<()> + Send,
{
    fn on_progress(&mut self, snapshot: &ProgressSnapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

/// Tracks counters for a run and forwards snapshots to an optional observer.
pub struct ProgressTracker<'a> {
    snapshot: ProgressSnapshot,
    observer: Option<&'a mut dyn ProgressObserver>,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(observer: Option<&'a mut dyn ProgressObserver>) -> Self {
        Self {
            snapshot: ProgressSnapshot::new(),
            observer,
        }
    }

    /// Current snapshot (copied).
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot
    }

    /// Record the advisory totals read from the source. Does not notify.
    pub fn set_totals(&mut self, nodes: u64, relationships: u64) {
        self.snapshot.total_nodes = nodes;
        self.snapshot.total_relationships = relationships;
    }

    /// Move to `stage` and notify the observer.
    pub fn enter(&mut self, stage: Stage) -> NeorepResult<()> {
        self.snapshot.stage = stage;
        self.emit()
    }

    /// Set the cumulative processed-node count and notify the observer.
    pub fn nodes_processed(&mut self, processed: u64) -> NeorepResult<()> {
        self.snapshot.processed_nodes = processed;
        self.emit()
    }

    /// Set the cumulative processed-relationship count and notify the observer.
    pub fn relationships_processed(&mut self, processed: u64) -> NeorepResult<()> {
        self.snapshot.processed_relationships = processed;
        self.emit()
    }

    fn emit(&mut self) -> NeorepResult<()> {
        let snapshot = self.snapshot;
        match self.observer.as_mut() {
            Some(observer) => observer.on_progress(&snapshot).map_err(NeorepError::Observer),
            None => Ok(()),
        }
    }
}
