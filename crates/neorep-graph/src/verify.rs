//! Post-run verification.

use serde::Serialize;

use neorep_core::NeorepResult;

use crate::cleanup::count_correlated;
use crate::cypher;
use crate::executor::{QueryExecutor, Statement};

/// Node and relationship counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub nodes: u64,
    pub relationships: u64,
}

/// Count nodes and relationships in one database.
pub async fn graph_counts<E: QueryExecutor + ?Sized>(executor: &E) -> NeorepResult<GraphCounts> {
    let nodes = executor
        .query_count(Statement::new(cypher::COUNT_NODES), "count")
        .await?;
    let relationships = executor
        .query_count(Statement::new(cypher::COUNT_RELATIONSHIPS), "count")
        .await?;
    Ok(GraphCounts { nodes, relationships })
}

/// Comparison of source and target after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub source: GraphCounts,
    pub target: GraphCounts,
    /// Target nodes still carrying the correlation property.
    pub leftover_correlation: u64,
}

impl VerificationReport {
    pub fn nodes_match(&self) -> bool {
        self.source.nodes == self.target.nodes
    }

    pub fn relationships_match(&self) -> bool {
        self.source.relationships == self.target.relationships
    }

    pub fn is_consistent(&self) -> bool {
        self.nodes_match() && self.relationships_match() && self.leftover_correlation == 0
    }
}

/// Compare counts in both databases and look for leftover correlation properties.
pub async fn verify<S, T>(source: &S, target: &T) -> NeorepResult<VerificationReport>
where
    S: QueryExecutor + ?Sized,
    T: QueryExecutor + ?Sized,
{
    Ok(VerificationReport {
        source: graph_counts(source).await?,
        target: graph_counts(target).await?,
        leftover_correlation: count_correlated(target).await?,
    })
}
