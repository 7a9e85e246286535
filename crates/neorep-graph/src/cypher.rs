//! Cypher statement text used by the replicator.
//!
//! Labels and relationship types cannot be passed as parameters, so the
//! statements that need them are built here with every identifier quoted.

/// Property written on target nodes to correlate them with source ids.
pub const CORRELATION_PROPERTY: &str = "source_id";

pub const PING: &str = "RETURN 1 AS ok";

pub const COUNT_NODES: &str = "MATCH (n) RETURN count(n) AS count";

pub const COUNT_RELATIONSHIPS: &str = "MATCH ()-[r]->() RETURN count(r) AS count";

pub const COUNT_CORRELATED: &str = "MATCH (n) WHERE n.source_id IS NOT NULL RETURN count(n) AS count";

/// Deletes up to `$limit` nodes (and their relationships) per call.
pub const CLEAR_BATCH: &str = "MATCH (n) WITH n LIMIT $limit DETACH DELETE n RETURN count(*) AS deleted";

pub const SHOW_CONSTRAINTS: &str = "SHOW CONSTRAINTS";

pub const SHOW_INDEXES: &str = "SHOW INDEXES WHERE type <> 'CONSTRAINT'";

pub const FETCH_NODES: &str = "MATCH (n) RETURN id(n) AS nodeId, labels(n) AS labels, properties(n) AS properties SKIP $skip LIMIT $limit";

pub const FETCH_RELATIONSHIPS: &str = "MATCH (a)-[r]->(b) RETURN id(a) AS startId, id(b) AS endId, type(r) AS type, properties(r) AS properties SKIP $skip LIMIT $limit";

pub const REMOVE_CORRELATION: &str = "MATCH (n) WHERE n.source_id IS NOT NULL REMOVE n.source_id RETURN count(n) AS cleaned";

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// `:`A`:`B`` for a label list, empty for no labels.
pub fn label_pattern(labels: &[String]) -> String {
    labels.iter().map(|l| format!(":{}", quote(l))).collect()
}

/// `A|B` alternation used by full-text index definitions.
pub fn label_alternation(labels: &[String]) -> String {
    labels.iter().map(|l| quote(l)).collect::<Vec<_>>().join("|")
}

/// Bulk node creation for one label combination. Expects `$nodes` as a list of
/// `{nodeId, properties}` maps.
pub fn create_nodes(labels: &[String]) -> String {
    format!(
        "UNWIND $nodes AS node CREATE (n{}) SET n = node.properties, n.{} = node.nodeId",
        label_pattern(labels),
        CORRELATION_PROPERTY
    )
}

/// Bulk relationship creation for one type. Expects `$rels` as a list of
/// `{startId, endId, properties}` maps; returns the number created.
pub fn create_relationships(rel_type: &str) -> String {
    format!(
        "UNWIND $rels AS rel MATCH (a {{{prop}: rel.startId}}), (b {{{prop}: rel.endId}}) \
         CREATE (a)-[r:{}]->(b) SET r = rel.properties RETURN count(r) AS created",
        quote(rel_type),
        prop = CORRELATION_PROPERTY
    )
}
