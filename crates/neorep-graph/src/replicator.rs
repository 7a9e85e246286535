//! Replication orchestrator.
//!
//! Runs the stages strictly in order against a source and a target executor:
//! clearing, schema, nodes, relationships, cleanup, complete. A failing stage
//! aborts the run and leaves the target partially written.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use neorep_core::{NeorepResult, ProgressObserver, ProgressTracker, ReplicationConfig, Stage};

use crate::cleanup::{clear_target, count_correlated, remove_correlation_property};
use crate::client::GraphClient;
use crate::cypher;
use crate::executor::QueryExecutor;
use crate::nodes::copy_nodes;
use crate::relationships::copy_relationships;
use crate::schema::{translate_schema, SchemaReport};
use crate::verify::{graph_counts, GraphCounts, VerificationReport};

/// Outcome of the connection test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub source: bool,
    pub target: bool,
}

impl ConnectionStatus {
    pub fn all_ok(&self) -> bool {
        self.source && self.target
    }
}

/// Totals of a completed replication run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub nodes_deleted: u64,
    /// Source nodes that already had a correlation property of their own.
    pub source_id_collisions: u64,
    pub schema: SchemaReport,
    pub nodes_copied: u64,
    /// Relationships read from the source.
    pub relationships_copied: u64,
    /// Relationships the target reported as created.
    pub relationships_created: u64,
    pub correlation_removed: u64,
}

/// Copies one Neo4j database into another.
pub struct Replicator<E: QueryExecutor> {
    source: E,
    target: E,
    batch_size: usize,
}

impl Replicator<GraphClient> {
    /// Build Neo4j clients for both databases described by `config`.
    pub async fn connect(config: &ReplicationConfig) -> NeorepResult<Self> {
        config.validate()?;
        let source = GraphClient::connect(&config.source).await?;
        let target = GraphClient::connect(&config.target).await?;
        Ok(Self::new(source, target, config.batch_size))
    }
}

impl<E: QueryExecutor> Replicator<E> {
    /// A batch size of 0 is treated as 1.
    pub fn new(source: E, target: E, batch_size: usize) -> Self {
        Self {
            source,
            target,
            batch_size: batch_size.max(1),
        }
    }

    pub fn source(&self) -> &E {
        &self.source
    }

    pub fn target(&self) -> &E {
        &self.target
    }

    /// Page size for nodes and for clearing.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Page size for relationships, half the node batch and never 0.
    pub fn relationship_batch_size(&self) -> usize {
        (self.batch_size / 2).max(1)
    }

    /// Check both databases answer a trivial query. Never fails.
    pub async fn test_connections(&self) -> ConnectionStatus {
        let source = match self.source.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Source database is not reachable");
                false
            }
        };
        let target = match self.target.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Target database is not reachable");
                false
            }
        };
        ConnectionStatus { source, target }
    }

    /// Node and relationship counts of both databases.
    pub async fn counts(&self) -> NeorepResult<(GraphCounts, GraphCounts)> {
        Ok((graph_counts(&self.source).await?, graph_counts(&self.target).await?))
    }

    /// Compare source and target after a run.
    pub async fn verify(&self) -> NeorepResult<VerificationReport> {
        crate::verify::verify(&self.source, &self.target).await
    }

    /// Replace the target's data with a copy of the source.
    ///
    /// The observer is called after every stage transition and after every
    /// page. An observer error aborts the run with `NeorepError::Observer`;
    /// any other failure is wrapped with the stage it happened in.
    pub async fn replicate(&self, observer: Option<&mut dyn ProgressObserver>) -> NeorepResult<ReplicationReport> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut tracker = ProgressTracker::new(observer);

        let totals = graph_counts(&self.source).await?;
        tracker.set_totals(totals.nodes, totals.relationships);
        let source_id_collisions = count_correlated(&self.source).await?;
        if source_id_collisions > 0 {
            warn!(
                nodes = source_id_collisions,
                property = cypher::CORRELATION_PROPERTY,
                "Source nodes already carry the correlation property; the copies lose their own value"
            );
        }
        info!(
            nodes = totals.nodes,
            relationships = totals.relationships,
            batch_size = self.batch_size,
            "Starting replication"
        );

        tracker.enter(Stage::Clearing)?;
        let nodes_deleted = clear_target(&self.target, self.batch_size)
            .await
            .map_err(|e| e.in_stage(Stage::Clearing))?;
        info!(stage = %Stage::Clearing, nodes_deleted, "Stage complete");

        tracker.enter(Stage::Schema)?;
        let schema = translate_schema(&self.source, &self.target)
            .await
            .map_err(|e| e.in_stage(Stage::Schema))?;
        info!(stage = %Stage::Schema, items = schema.total(), failed = schema.failed, "Stage complete");

        tracker.enter(Stage::Nodes)?;
        let nodes_copied = copy_nodes(&self.source, &self.target, self.batch_size, |processed| {
            tracker.nodes_processed(processed)
        })
        .await
        .map_err(|e| e.in_stage(Stage::Nodes))?;
        info!(stage = %Stage::Nodes, nodes = nodes_copied, "Stage complete");

        tracker.enter(Stage::Relationships)?;
        let rel_stats = copy_relationships(
            &self.source,
            &self.target,
            self.relationship_batch_size(),
            |processed| tracker.relationships_processed(processed),
        )
        .await
        .map_err(|e| e.in_stage(Stage::Relationships))?;
        info!(
            stage = %Stage::Relationships,
            processed = rel_stats.processed,
            created = rel_stats.created,
            "Stage complete"
        );
        if rel_stats.unresolved() > 0 {
            warn!(
                unresolved = rel_stats.unresolved(),
                "Relationships skipped because an endpoint was missing in the target"
            );
        }

        tracker.enter(Stage::Cleanup)?;
        let correlation_removed = remove_correlation_property(&self.target)
            .await
            .map_err(|e| e.in_stage(Stage::Cleanup))?;

        tracker.enter(Stage::Complete)?;

        let report = ReplicationReport {
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            nodes_deleted,
            source_id_collisions,
            schema,
            nodes_copied,
            relationships_copied: rel_stats.processed,
            relationships_created: rel_stats.created,
            correlation_removed,
        };
        info!(
            nodes = report.nodes_copied,
            relationships = report.relationships_created,
            elapsed_ms = report.elapsed_ms,
            "Replication complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use chrono::NaiveDate;
    use neo4rs::{BoltDate, BoltFloat, BoltInteger, BoltPoint2D, BoltType};
    use neorep_core::{NeorepError, Properties, ProgressSnapshot};
    use serde_json::json;

    fn course_graph() -> MemoryGraph {
        let source = MemoryGraph::new();
        let cs101 = source.add_node(&["Course"], json!({"code": "CS 101", "credits": 3}));
        let cs102 = source.add_node(&["Course"], json!({"code": "CS 102", "credits": 3}));
        let math = source.add_node(&["Course"], json!({"code": "MATH 101", "credits": 4}));
        let ada = source.add_node(&["Person", "Instructor"], json!({"name": "Ada"}));
        let fall = source.add_node(&["Term"], json!({"name": "Fall"}));
        source.add_relationship(cs102, cs101, "PREREQUISITE", json!({"minimum_grade": "C"}));
        source.add_relationship(ada, cs101, "TEACHES", json!({}));
        source.add_relationship(cs101, fall, "OFFERED_IN", json!({"sections": 2}));
        source.add_relationship(math, fall, "OFFERED_IN", json!({"sections": 1}));
        source.add_constraint("course_code", "UNIQUENESS", "NODE", &["Course"], &["code"]);
        source
    }

    #[test]
    fn test_relationship_batch_size_never_zero() {
        let replicator = Replicator::new(MemoryGraph::new(), MemoryGraph::new(), 1);
        assert_eq!(replicator.relationship_batch_size(), 1);
        let replicator = Replicator::new(MemoryGraph::new(), MemoryGraph::new(), 0);
        assert_eq!(replicator.batch_size(), 1);
        let replicator = Replicator::new(MemoryGraph::new(), MemoryGraph::new(), 1000);
        assert_eq!(replicator.relationship_batch_size(), 500);
    }

    #[tokio::test]
    async fn test_replicate_preserves_counts() {
        let source = course_graph();
        let target = MemoryGraph::new();
        target.add_node(&["Stale"], json!({"old": true}));

        let replicator = Replicator::new(source.clone(), target.clone(), 2);
        let report = replicator.replicate(None).await.unwrap();

        assert_eq!(report.nodes_deleted, 1);
        assert_eq!(report.nodes_copied, 5);
        assert_eq!(report.relationships_copied, 4);
        assert_eq!(report.relationships_created, 4);
        assert_eq!(report.correlation_removed, 5);
        assert_eq!(report.source_id_collisions, 0);
        assert_eq!(report.schema.constraints_created, 1);

        assert_eq!(target.node_count(), 5);
        assert_eq!(target.relationship_count(), 4);
        assert!(target
            .nodes()
            .iter()
            .all(|n| !n.properties.contains_key(cypher::CORRELATION_PROPERTY)));
        assert!(target.nodes().iter().all(|n| n.labels != vec!["Stale"]));

        let verification = replicator.verify().await.unwrap();
        assert!(verification.is_consistent());
    }

    #[tokio::test]
    async fn test_source_nodes_with_own_source_id_are_counted() {
        let source = course_graph();
        source.add_node(&["Legacy"], json!({"source_id": "erp-17", "name": "Old import"}));
        let target = MemoryGraph::new();

        let replicator = Replicator::new(source, target.clone(), 10);
        let report = replicator.replicate(None).await.unwrap();

        assert_eq!(report.source_id_collisions, 1);
        assert_eq!(report.nodes_copied, 6);
        let legacy = target.nodes().into_iter().find(|n| n.labels == vec!["Legacy"]).unwrap();
        assert!(!legacy.properties.contains_key(cypher::CORRELATION_PROPERTY));
    }

    #[tokio::test]
    async fn test_spatial_and_temporal_properties_are_copied() {
        let source = MemoryGraph::new();
        let mut properties = Properties::new();
        properties.insert(
            "location".to_string(),
            BoltType::Point2D(BoltPoint2D {
                sr_id: BoltInteger::new(4326),
                x: BoltFloat::new(-75.19),
                y: BoltFloat::new(39.95),
            }),
        );
        properties.insert(
            "opened".to_string(),
            BoltType::Date(BoltDate::from(NaiveDate::from_ymd_opt(1740, 11, 14).unwrap())),
        );
        properties.insert("seal".to_string(), BoltType::from(vec![0u8, 159, 146, 150]));
        source.add_node_with(&["Campus"], properties.clone());
        let target = MemoryGraph::new();

        let replicator = Replicator::new(source, target.clone(), 10);
        replicator.replicate(None).await.unwrap();

        let nodes = target.nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].properties, properties);
    }

    #[tokio::test]
    async fn test_observer_sees_stages_and_counts() {
        let source = course_graph();
        let target = MemoryGraph::new();
        let replicator = Replicator::new(source, target, 2);

        let mut seen: Vec<ProgressSnapshot> = Vec::new();
        let mut record = |snapshot: &ProgressSnapshot| -> anyhow::Result<()> {
            seen.push(*snapshot);
            Ok(())
        };
        let observer: &mut dyn ProgressObserver = &mut record;
        replicator.replicate(Some(observer)).await.unwrap();

        let mut stages: Vec<Stage> = seen.iter().map(|s| s.stage).collect();
        stages.dedup();
        assert_eq!(stages, Stage::ALL.to_vec());

        let node_counts: Vec<u64> = seen
            .iter()
            .filter(|s| s.stage == Stage::Nodes && s.processed_nodes > 0)
            .map(|s| s.processed_nodes)
            .collect();
        assert_eq!(node_counts, vec![2, 4, 5]);

        // Relationship batch is 1 at node batch 2.
        let rel_counts: Vec<u64> = seen
            .iter()
            .filter(|s| s.stage == Stage::Relationships && s.processed_relationships > 0)
            .map(|s| s.processed_relationships)
            .collect();
        assert_eq!(rel_counts, vec![1, 2, 3, 4]);

        let last = seen.last().unwrap();
        assert_eq!(last.stage, Stage::Complete);
        assert_eq!(last.total_nodes, 5);
        assert_eq!(last.total_relationships, 4);
    }

    #[tokio::test]
    async fn test_observer_error_aborts_run() {
        let source = course_graph();
        let target = MemoryGraph::new();
        let replicator = Replicator::new(source, target.clone(), 10);

        let mut stop_at_nodes = |snapshot: &ProgressSnapshot| -> anyhow::Result<()> {
            if snapshot.stage == Stage::Nodes {
                anyhow::bail!("cancelled by user");
            }
            Ok(())
        };
        let observer: &mut dyn ProgressObserver = &mut stop_at_nodes;
        let err = replicator.replicate(Some(observer)).await.unwrap_err();

        assert!(matches!(err, NeorepError::Observer(_)));
        assert_eq!(target.node_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_reports_stage() {
        let source = course_graph();
        let target = MemoryGraph::new();
        target.fail_when("UNWIND $rels", "Neo.TransientError.General.DatabaseUnavailable");
        let replicator = Replicator::new(source, target.clone(), 10);

        let err = replicator.replicate(None).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Relationships));
        // Nodes stay behind with their correlation property; there is no rollback.
        assert_eq!(target.node_count(), 5);
        assert_eq!(target.count_statements(cypher::REMOVE_CORRELATION), 0);
    }

    #[tokio::test]
    async fn test_schema_conflicts_do_not_abort() {
        let source = course_graph();
        let target = MemoryGraph::new();
        target.add_existing_schema("course_code");
        let replicator = Replicator::new(source, target.clone(), 10);

        let report = replicator.replicate(None).await.unwrap();
        assert_eq!(report.schema.already_existing, 1);
        assert_eq!(report.schema.constraints_created, 0);
        assert_eq!(target.node_count(), 5);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let replicator = Replicator::new(MemoryGraph::new(), MemoryGraph::new(), 3);
        let report = replicator.replicate(None).await.unwrap();
        assert_eq!(report.nodes_copied, 0);
        assert_eq!(report.relationships_copied, 0);
        assert_eq!(report.correlation_removed, 0);
    }

    #[tokio::test]
    async fn test_connection_test_never_fails() {
        let source = MemoryGraph::new();
        source.set_unreachable();
        let replicator = Replicator::new(source, MemoryGraph::new(), 10);

        let status = replicator.test_connections().await;
        assert_eq!(status, ConnectionStatus { source: false, target: true });
        assert!(!status.all_ok());
    }

    #[tokio::test]
    async fn test_counts() {
        let replicator = Replicator::new(course_graph(), MemoryGraph::new(), 10);
        let (source, target) = replicator.counts().await.unwrap();
        assert_eq!(source, GraphCounts { nodes: 5, relationships: 4 });
        assert_eq!(target, GraphCounts::default());
    }
}
