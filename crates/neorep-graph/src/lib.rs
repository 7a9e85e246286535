//! # Neorep Graph
//!
//! Neo4j-to-Neo4j replication.
//!
//! Clears the target, recreates the source schema, copies nodes and
//! relationships in batches and verifies the result. All database access
//! goes through [`QueryExecutor`], implemented for Neo4j by [`GraphClient`].

pub mod cleanup;
pub mod client;
pub mod cypher;
pub mod executor;
pub mod nodes;
pub mod relationships;
pub mod replicator;
pub mod schema;
pub mod value;
pub mod verify;

#[cfg(test)]
pub(crate) mod memory;

pub use client::GraphClient;
pub use executor::{QueryExecutor, Record, Statement};
pub use relationships::RelationshipCopyStats;
pub use replicator::{ConnectionStatus, ReplicationReport, Replicator};
pub use schema::{SchemaOutcome, SchemaReport};
pub use verify::{GraphCounts, VerificationReport};
