//! neorep Core Library
//!
//! Configuration, error types and the in-flight data model shared by the
//! replicator and the CLI. Nothing here talks to a database; property values
//! use the Bolt types from `neo4rs` so they survive the copy unchanged.

pub mod config;
pub mod error;
pub mod model;
pub mod progress;

pub use config::{GraphConfig, ReplicationConfig, DEFAULT_BATCH_SIZE};
pub use error::{NeorepError, NeorepResult};
pub use model::{
    properties_from_bolt, properties_to_bolt, ConstraintKind, ConstraintRule, EntityScope, IndexKind,
    IndexRule, NodeRecord, Properties, RelationshipRecord,
};
pub use progress::{ProgressObserver, ProgressSnapshot, ProgressTracker, Stage};
