//! In-memory graph used as a test double for [`QueryExecutor`].
//!
//! It understands exactly the statements in [`crate::cypher`] plus the schema
//! DDL produced by [`crate::schema`], records every statement it receives, and
//! can be told to fail statements containing a given fragment.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use neo4rs::{BoltBoolean, BoltFloat, BoltList, BoltMap, BoltNull, BoltString, BoltType};
use serde_json::{json, Value};

use neorep_core::{properties_from_bolt, properties_to_bolt, NeorepError, NeorepResult, Properties};

use crate::cypher;
use crate::executor::{QueryExecutor, Record, Statement};

#[derive(Debug, Clone, PartialEq)]
pub struct MemNode {
    pub labels: Vec<String>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemRelationship {
    pub start: i64,
    pub end: i64,
    pub rel_type: String,
    pub properties: Properties,
}

#[derive(Debug, Default)]
pub struct GraphState {
    next_id: i64,
    pub nodes: BTreeMap<i64, MemNode>,
    pub relationships: Vec<MemRelationship>,
    pub constraint_rows: Vec<BoltMap>,
    pub index_rows: Vec<BoltMap>,
    pub schema_names: BTreeSet<String>,
    pub ddl: Vec<String>,
    pub statements: Vec<Statement>,
    failures: Vec<(String, String)>,
    unreachable: bool,
}

/// Shared handle; clones see the same graph.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<GraphState>>,
}

/// Convert seed JSON into the Bolt value the driver would hand back.
pub fn bolt(value: Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or_default())),
        },
        Value::String(s) => BoltType::String(BoltString::from(s)),
        Value::Array(items) => BoltType::List(BoltList::from(items.into_iter().map(bolt).collect::<Vec<_>>())),
        Value::Object(map) => {
            let mut out = BoltMap::with_capacity(map.len());
            for (key, item) in map {
                out.put(BoltString::from(key), bolt(item));
            }
            BoltType::Map(out)
        }
    }
}

fn bolt_map(value: Value) -> BoltMap {
    match bolt(value) {
        BoltType::Map(map) => map,
        BoltType::Null(_) => BoltMap::default(),
        other => panic!("expected an object, got {other:?}"),
    }
}

fn props(value: Value) -> Properties {
    properties_from_bolt(&bolt_map(value))
}

fn bolt_props(value: Option<&BoltType>) -> Properties {
    match value {
        Some(BoltType::Map(map)) => properties_from_bolt(map),
        _ => Properties::new(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, GraphState> {
        self.state.lock().unwrap()
    }

    pub fn add_node(&self, labels: &[&str], properties: Value) -> i64 {
        self.add_node_with(labels, props(properties))
    }

    /// Seed a node with Bolt property values JSON cannot express.
    pub fn add_node_with(&self, labels: &[&str], properties: Properties) -> i64 {
        self.state().insert_node(strings(labels), properties)
    }

    pub fn add_relationship(&self, start: i64, end: i64, rel_type: &str, properties: Value) {
        self.state().relationships.push(MemRelationship {
            start,
            end,
            rel_type: rel_type.to_string(),
            properties: props(properties),
        });
    }

    /// Seed a `SHOW CONSTRAINTS` row.
    pub fn add_constraint(&self, name: &str, kind: &str, entity: &str, labels: &[&str], properties: &[&str]) {
        self.state().constraint_rows.push(bolt_map(json!({
            "name": name,
            "type": kind,
            "entityType": entity,
            "labelsOrTypes": labels,
            "properties": properties,
        })));
    }

    /// Seed a `SHOW INDEXES` row.
    pub fn add_index(
        &self,
        name: &str,
        kind: &str,
        entity: &str,
        labels: Option<&[&str]>,
        properties: Option<&[&str]>,
        owning_constraint: Option<&str>,
    ) {
        self.state().index_rows.push(bolt_map(json!({
            "name": name,
            "type": kind,
            "entityType": entity,
            "labelsOrTypes": labels,
            "properties": properties,
            "owningConstraint": owning_constraint,
        })));
    }

    /// Mark a schema name as already present.
    pub fn add_existing_schema(&self, name: &str) {
        self.state().schema_names.insert(name.to_string());
    }

    /// Fail every statement whose text contains `fragment` with `code`.
    pub fn fail_when(&self, fragment: &str, code: &str) {
        self.state().failures.push((fragment.to_string(), code.to_string()));
    }

    /// Make every statement fail as if the server were down.
    pub fn set_unreachable(&self) {
        self.state().unreachable = true;
    }

    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state().relationships.len()
    }

    pub fn statement_texts(&self) -> Vec<String> {
        self.state().statements.iter().map(|s| s.text().to_string()).collect()
    }

    /// Number of statements whose text equals `text`.
    pub fn count_statements(&self, text: &str) -> usize {
        self.state().statements.iter().filter(|s| s.text() == text).count()
    }

    pub fn nodes(&self) -> Vec<MemNode> {
        self.state().nodes.values().cloned().collect()
    }

    pub fn relationships(&self) -> Vec<MemRelationship> {
        self.state().relationships.clone()
    }

    fn execute(&self, statement: Statement) -> NeorepResult<Vec<Record>> {
        let mut state = self.state();
        if state.unreachable {
            return Err(NeorepError::Connection("connection refused".to_string()));
        }
        state.statements.push(statement.clone());

        let text = statement.text();
        if let Some((_, code)) = state.failures.iter().find(|(fragment, _)| text.contains(fragment.as_str())) {
            return Err(NeorepError::query(code.clone(), "injected failure"));
        }

        match text {
            cypher::PING => Ok(vec![row(json!({"ok": 1}))]),
            cypher::COUNT_NODES => Ok(vec![row(json!({"count": state.nodes.len()}))]),
            cypher::COUNT_RELATIONSHIPS => Ok(vec![row(json!({"count": state.relationships.len()}))]),
            cypher::COUNT_CORRELATED => {
                let count = state.correlated().count();
                Ok(vec![row(json!({"count": count}))])
            }
            cypher::CLEAR_BATCH => {
                let limit = int_param(&statement, "limit") as usize;
                let doomed: Vec<i64> = state.nodes.keys().take(limit).copied().collect();
                for id in &doomed {
                    state.nodes.remove(id);
                }
                state
                    .relationships
                    .retain(|r| !doomed.contains(&r.start) && !doomed.contains(&r.end));
                Ok(vec![row(json!({"deleted": doomed.len()}))])
            }
            cypher::SHOW_CONSTRAINTS => Ok(state.constraint_rows.iter().cloned().map(Record::new).collect()),
            cypher::SHOW_INDEXES => Ok(state.index_rows.iter().cloned().map(Record::new).collect()),
            cypher::FETCH_NODES => {
                let (skip, limit) = page(&statement);
                Ok(state
                    .nodes
                    .iter()
                    .skip(skip)
                    .take(limit)
                    .map(|(id, node)| {
                        Record::from_iter([
                            ("nodeId".to_string(), BoltType::from(*id)),
                            ("labels".to_string(), BoltType::from(node.labels.clone())),
                            ("properties".to_string(), properties_to_bolt(&node.properties)),
                        ])
                    })
                    .collect())
            }
            cypher::FETCH_RELATIONSHIPS => {
                let (skip, limit) = page(&statement);
                Ok(state
                    .relationships
                    .iter()
                    .skip(skip)
                    .take(limit)
                    .map(|r| {
                        Record::from_iter([
                            ("startId".to_string(), BoltType::from(r.start)),
                            ("endId".to_string(), BoltType::from(r.end)),
                            ("type".to_string(), BoltType::from(r.rel_type.clone())),
                            ("properties".to_string(), properties_to_bolt(&r.properties)),
                        ])
                    })
                    .collect())
            }
            cypher::REMOVE_CORRELATION => {
                let mut cleaned = 0;
                for node in state.nodes.values_mut() {
                    if node.properties.remove(cypher::CORRELATION_PROPERTY).is_some() {
                        cleaned += 1;
                    }
                }
                Ok(vec![row(json!({"cleaned": cleaned}))])
            }
            t if t.starts_with("CREATE ") => {
                let name = quoted_identifiers(t).into_iter().next().unwrap_or_default();
                if !state.schema_names.insert(name.clone()) {
                    return Err(NeorepError::query(
                        "Neo.ClientError.Schema.EquivalentSchemaRuleAlreadyExists",
                        format!("An equivalent schema rule named `{name}` already exists"),
                    ));
                }
                state.ddl.push(t.to_string());
                Ok(Vec::new())
            }
            t if t.starts_with("UNWIND $nodes") => {
                let pattern = between(t, "CREATE (n", ") SET");
                let labels = quoted_identifiers(pattern);
                for item in list_param(&statement, "nodes") {
                    let mut properties = bolt_props(item.value.get("properties"));
                    if let Some(id) = item.value.get("nodeId") {
                        properties.insert(cypher::CORRELATION_PROPERTY.to_string(), id.clone());
                    }
                    state.insert_node(labels.clone(), properties);
                }
                Ok(Vec::new())
            }
            t if t.starts_with("UNWIND $rels") => {
                let rel_type = quoted_identifiers(between(t, "[r:", "]->")).into_iter().next().unwrap_or_default();
                let mut created = 0;
                for item in list_param(&statement, "rels") {
                    let start = item.value.get("startId").and_then(|id| state.find_correlated(id));
                    let end = item.value.get("endId").and_then(|id| state.find_correlated(id));
                    // MATCH yields no row when an endpoint is missing.
                    if let (Some(start), Some(end)) = (start, end) {
                        state.relationships.push(MemRelationship {
                            start,
                            end,
                            rel_type: rel_type.clone(),
                            properties: bolt_props(item.value.get("properties")),
                        });
                        created += 1;
                    }
                }
                Ok(vec![row(json!({"created": created}))])
            }
            other => Err(NeorepError::query(
                "Neo.ClientError.Statement.SyntaxError",
                format!("memory graph does not understand: {other}"),
            )),
        }
    }
}

impl GraphState {
    fn insert_node(&mut self, labels: Vec<String>, properties: Properties) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, MemNode { labels, properties });
        id
    }

    fn correlated(&self) -> impl Iterator<Item = (&i64, &MemNode)> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.properties.contains_key(cypher::CORRELATION_PROPERTY))
    }

    fn find_correlated(&self, source_id: &BoltType) -> Option<i64> {
        self.correlated()
            .find(|(_, n)| n.properties.get(cypher::CORRELATION_PROPERTY) == Some(source_id))
            .map(|(id, _)| *id)
    }
}

#[async_trait]
impl QueryExecutor for MemoryGraph {
    async fn run(&self, statement: Statement) -> NeorepResult<Vec<Record>> {
        self.execute(statement)
    }
}

fn row(value: Value) -> Record {
    Record::new(bolt_map(value))
}

fn int_param(statement: &Statement, key: &str) -> i64 {
    match statement.get_param(key) {
        Some(BoltType::Integer(i)) => i.value,
        _ => 0,
    }
}

fn page(statement: &Statement) -> (usize, usize) {
    (int_param(statement, "skip") as usize, int_param(statement, "limit") as usize)
}

fn list_param(statement: &Statement, key: &str) -> Vec<BoltMap> {
    match statement.get_param(key) {
        Some(BoltType::List(items)) => items
            .value
            .iter()
            .filter_map(|item| match item {
                BoltType::Map(map) => Some(map.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> &'a str {
    let Some(start) = text.find(open).map(|i| i + open.len()) else {
        return "";
    };
    match text[start..].find(close) {
        Some(end) => &text[start..start + end],
        None => "",
    }
}

/// Backtick-quoted identifiers in order, with doubled backticks unescaped.
fn quoted_identifiers(text: &str) -> Vec<String> {
    let mut identifiers = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '`' {
            continue;
        }
        let mut ident = String::new();
        while let Some(c) = chars.next() {
            if c == '`' {
                if chars.peek() == Some(&'`') {
                    chars.next();
                    ident.push('`');
                } else {
                    break;
                }
            } else {
                ident.push(c);
            }
        }
        identifiers.push(ident);
    }
    identifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_identifiers() {
        assert_eq!(quoted_identifiers(":`A`:`B``C`"), vec!["A", "B`C"]);
        assert!(quoted_identifiers("(n)").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_statement_fails() {
        let graph = MemoryGraph::new();
        assert!(graph.run(Statement::new("MATCH (x) RETURN x")).await.is_err());
        assert_eq!(graph.statement_texts().len(), 1);
    }
}
