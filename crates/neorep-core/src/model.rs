//! In-flight records read from the source graph.
//!
//! None of these are persisted by neorep: they live for one page of a copy
//! stage (or one pass of the schema stage) and are dropped once written.

use std::collections::BTreeMap;

use neo4rs::{BoltMap, BoltString, BoltType};
use serde::{Deserialize, Serialize};

/// Property map of a node or relationship.
///
/// Values stay in their Bolt form from read to write, so points, temporal
/// values and byte arrays reach the target with their original type.
pub type Properties = BTreeMap<String, BoltType>;

/// Collect a Bolt map into [`Properties`].
pub fn properties_from_bolt(map: &BoltMap) -> Properties {
    map.value
        .iter()
        .map(|(key, value)| (key.value.clone(), value.clone()))
        .collect()
}

/// Turn [`Properties`] back into a Bolt map value for a statement parameter.
pub fn properties_to_bolt(properties: &Properties) -> BoltType {
    let mut map = BoltMap::with_capacity(properties.len());
    for (key, value) in properties {
        map.put(BoltString::new(key), value.clone());
    }
    BoltType::Map(map)
}

/// A node as read from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Internal id assigned by the source database.
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: Properties,
}

impl NodeRecord {
    pub fn new(id: i64, labels: Vec<String>, properties: Properties) -> Self {
        Self {
            id,
            labels,
            properties,
        }
    }

    /// Labels sorted into canonical order.
    pub fn sorted_labels(&self) -> Vec<String> {
        let mut labels = self.labels.clone();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Canonical grouping key: sorted labels joined with `:`.
    ///
    /// `{A, B}` and `{B, A}` share a key; an unlabeled node has the empty key.
    pub fn label_key(&self) -> String {
        self.sorted_labels().join(":")
    }
}

/// A relationship as read from the source, endpoints given by source ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipRecord {
    pub start_id: i64,
    pub end_id: i64,
    pub rel_type: String,
    pub properties: Properties,
}

/// Whether a schema rule applies to nodes or relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityScope {
    Node,
    Relationship,
}

impl EntityScope {
    /// Parse the `entityType` column of `SHOW CONSTRAINTS` / `SHOW INDEXES`.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("RELATIONSHIP") {
            EntityScope::Relationship
        } else {
            EntityScope::Node
        }
    }
}

/// Constraint kinds neorep knows how to recreate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    Uniqueness,
    NodeKey,
    NodePropertyExistence,
    RelationshipPropertyExistence,
    Unknown(String),
}

impl ConstraintKind {
    /// Parse the `type` column of `SHOW CONSTRAINTS`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "UNIQUENESS" | "NODE_UNIQUENESS" | "RELATIONSHIP_UNIQUENESS" => ConstraintKind::Uniqueness,
            "NODE_KEY" => ConstraintKind::NodeKey,
            "NODE_PROPERTY_EXISTENCE" => ConstraintKind::NodePropertyExistence,
            "RELATIONSHIP_PROPERTY_EXISTENCE" => ConstraintKind::RelationshipPropertyExistence,
            _ => ConstraintKind::Unknown(value.to_string()),
        }
    }
}

/// A constraint read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRule {
    pub name: String,
    pub kind: ConstraintKind,
    pub scope: EntityScope,
    pub labels_or_types: Vec<String>,
    pub properties: Vec<String>,
}

/// Index kinds neorep knows how to recreate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Range,
    Text,
    Fulltext,
    Unknown(String),
}

impl IndexKind {
    /// Parse the `type` column of `SHOW INDEXES`.
    ///
    /// `BTREE` is the 4.x name for what 5.x calls a range index.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "RANGE" | "BTREE" => IndexKind::Range,
            "TEXT" => IndexKind::Text,
            "FULLTEXT" => IndexKind::Fulltext,
            _ => IndexKind::Unknown(value.to_string()),
        }
    }
}

/// An index read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRule {
    pub name: String,
    pub kind: IndexKind,
    pub scope: EntityScope,
    pub labels_or_types: Vec<String>,
    pub properties: Vec<String>,
    /// Name of the constraint this index backs, if any.
    pub owning_constraint: Option<String>,
}
