//! Schema translation (constraints and indexes).
//!
//! Reads every constraint, then every index, from the source and recreates
//! each one in the target under the same name. Each item produces a
//! [`SchemaOutcome`]; only failure to read the source schema aborts the stage.

use serde::Serialize;
use tracing::{debug, info, warn};

use neorep_core::{
    ConstraintKind, ConstraintRule, EntityScope, IndexKind, IndexRule, NeorepError, NeorepResult,
};

use crate::cypher::{self, label_alternation, quote};
use crate::executor::{QueryExecutor, Record, Statement};

/// Result of recreating one schema item in the target.
#[derive(Debug)]
pub enum SchemaOutcome {
    Created,
    /// The target already had an equivalent rule or one with the same name.
    AlreadyExists,
    /// No statement was generated for this item.
    Skipped(String),
    Failed(NeorepError),
}

/// Tally of schema outcomes for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub constraints_created: usize,
    pub indexes_created: usize,
    pub already_existing: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SchemaReport {
    pub fn total(&self) -> usize {
        self.constraints_created + self.indexes_created + self.already_existing + self.skipped + self.failed
    }
}

fn string_list(record: &Record, column: &str) -> NeorepResult<Vec<String>> {
    Ok(record.get_opt::<Vec<String>>(column)?.unwrap_or_default())
}

/// Decode a `SHOW CONSTRAINTS` row.
pub fn constraint_from_record(record: &Record) -> NeorepResult<ConstraintRule> {
    let kind: String = record.get("type")?;
    let entity: String = record.get_opt("entityType")?.unwrap_or_else(|| "NODE".to_string());
    let scope = EntityScope::parse(&entity);
    // 4.x reported relationship uniqueness without an entityType column
    let scope = if kind.eq_ignore_ascii_case("RELATIONSHIP_UNIQUENESS") {
        EntityScope::Relationship
    } else {
        scope
    };

    Ok(ConstraintRule {
        name: record.get("name")?,
        kind: ConstraintKind::parse(&kind),
        scope,
        labels_or_types: string_list(record, "labelsOrTypes")?,
        properties: string_list(record, "properties")?,
    })
}

/// Decode a `SHOW INDEXES` row.
pub fn index_from_record(record: &Record) -> NeorepResult<IndexRule> {
    let kind: String = record.get("type")?;
    let entity: String = record.get_opt("entityType")?.unwrap_or_else(|| "NODE".to_string());

    Ok(IndexRule {
        name: record.get("name")?,
        kind: IndexKind::parse(&kind),
        scope: EntityScope::parse(&entity),
        labels_or_types: string_list(record, "labelsOrTypes")?,
        properties: string_list(record, "properties")?,
        owning_constraint: record.get_opt("owningConstraint")?,
    })
}

/// `(n.a, n.b)` for composite requirements.
fn property_tuple(variable: &str, properties: &[String]) -> String {
    let items: Vec<String> = properties
        .iter()
        .map(|p| format!("{variable}.{}", quote(p)))
        .collect();
    format!("({})", items.join(", "))
}

/// `(n:Label)` or `()-[r:TYPE]-()` for a single label/type.
fn entity_pattern(scope: EntityScope, label_or_type: &str) -> (String, &'static str) {
    match scope {
        EntityScope::Node => (format!("(n:{})", quote(label_or_type)), "n"),
        EntityScope::Relationship => (format!("()-[r:{}]-()", quote(label_or_type)), "r"),
    }
}

/// Build the `CREATE CONSTRAINT` statement for a rule, or the reason it is skipped.
pub fn constraint_ddl(rule: &ConstraintRule) -> Result<String, String> {
    let Some(label_or_type) = rule.labels_or_types.first() else {
        return Err("constraint has no label or relationship type".to_string());
    };
    let Some(first_property) = rule.properties.first() else {
        return Err("constraint has no properties".to_string());
    };

    let (pattern, var) = entity_pattern(rule.scope, label_or_type);
    let name = quote(&rule.name);

    let requirement = match (&rule.kind, rule.scope) {
        (ConstraintKind::Uniqueness, _) => {
            format!("{} IS UNIQUE", property_tuple(var, &rule.properties))
        }
        (ConstraintKind::NodePropertyExistence, EntityScope::Node)
        | (ConstraintKind::RelationshipPropertyExistence, EntityScope::Relationship) => {
            format!("{var}.{} IS NOT NULL", quote(first_property))
        }
        (ConstraintKind::NodeKey, EntityScope::Node) => {
            format!("{} IS NODE KEY", property_tuple(var, &rule.properties))
        }
        (ConstraintKind::Unknown(kind), _) => {
            return Err(format!("unsupported constraint type '{kind}'"));
        }
        (kind, scope) => {
            return Err(format!("constraint type {kind:?} does not apply to {scope:?} scope"));
        }
    };

    Ok(format!("CREATE CONSTRAINT {name} FOR {pattern} REQUIRE {requirement}"))
}

/// Build the `CREATE ... INDEX` statement for a rule, or the reason it is skipped.
pub fn index_ddl(rule: &IndexRule) -> Result<String, String> {
    if let Some(owner) = &rule.owning_constraint {
        return Err(format!("backs constraint '{owner}'"));
    }
    if let IndexKind::Unknown(kind) = &rule.kind {
        return Err(format!("unsupported index type '{kind}'"));
    }
    let Some(label_or_type) = rule.labels_or_types.first() else {
        return Err("index has no label or relationship type".to_string());
    };
    let Some(first_property) = rule.properties.first() else {
        return Err("index has no properties".to_string());
    };

    let name = quote(&rule.name);
    let statement = match &rule.kind {
        IndexKind::Range => {
            let (pattern, var) = entity_pattern(rule.scope, label_or_type);
            format!(
                "CREATE INDEX {name} FOR {pattern} ON {}",
                property_tuple(var, &rule.properties)
            )
        }
        IndexKind::Text => {
            let (pattern, var) = entity_pattern(rule.scope, label_or_type);
            format!("CREATE TEXT INDEX {name} FOR {pattern} ON ({var}.{})", quote(first_property))
        }
        IndexKind::Fulltext => {
            let (pattern, var) = match rule.scope {
                EntityScope::Node => (format!("(n:{})", label_alternation(&rule.labels_or_types)), "n"),
                EntityScope::Relationship => {
                    (format!("()-[r:{}]-()", label_alternation(&rule.labels_or_types)), "r")
                }
            };
            let fields: Vec<String> = rule
                .properties
                .iter()
                .map(|p| format!("{var}.{}", quote(p)))
                .collect();
            format!(
                "CREATE FULLTEXT INDEX {name} FOR {pattern} ON EACH [{}]",
                fields.join(", ")
            )
        }
        IndexKind::Unknown(kind) => return Err(format!("unsupported index type '{kind}'")),
    };
    Ok(statement)
}

/// Read all constraints from the source.
pub async fn read_constraints<E: QueryExecutor + ?Sized>(source: &E) -> NeorepResult<Vec<ConstraintRule>> {
    source
        .run(Statement::new(cypher::SHOW_CONSTRAINTS))
        .await?
        .iter()
        .map(constraint_from_record)
        .collect()
}

/// Read all non-constraint indexes from the source.
pub async fn read_indexes<E: QueryExecutor + ?Sized>(source: &E) -> NeorepResult<Vec<IndexRule>> {
    source
        .run(Statement::new(cypher::SHOW_INDEXES))
        .await?
        .iter()
        .map(index_from_record)
        .collect()
}

/// Execute a generated DDL statement and classify the result.
pub async fn apply_ddl<E: QueryExecutor + ?Sized>(target: &E, ddl: Result<String, String>) -> SchemaOutcome {
    let statement = match ddl {
        Ok(statement) => statement,
        Err(reason) => return SchemaOutcome::Skipped(reason),
    };
    match target.run(Statement::new(statement)).await {
        Ok(_) => SchemaOutcome::Created,
        Err(e) if e.is_already_exists() => SchemaOutcome::AlreadyExists,
        Err(e) => SchemaOutcome::Failed(e),
    }
}

/// Copy every constraint and index from `source` to `target`.
pub async fn translate_schema<S, T>(source: &S, target: &T) -> NeorepResult<SchemaReport>
where
    S: QueryExecutor + ?Sized,
    T: QueryExecutor + ?Sized,
{
    let mut report = SchemaReport::default();

    let constraints = read_constraints(source).await?;
    info!(count = constraints.len(), "Copying constraints");
    for rule in &constraints {
        match apply_ddl(target, constraint_ddl(rule)).await {
            SchemaOutcome::Created => {
                debug!(name = %rule.name, "Created constraint");
                report.constraints_created += 1;
            }
            SchemaOutcome::AlreadyExists => {
                info!(name = %rule.name, "Constraint already exists in target");
                report.already_existing += 1;
            }
            SchemaOutcome::Skipped(reason) => {
                warn!(name = %rule.name, %reason, "Skipping constraint");
                report.skipped += 1;
            }
            SchemaOutcome::Failed(e) => {
                warn!(name = %rule.name, error = %e, "Failed to create constraint");
                report.failed += 1;
            }
        }
    }

    let indexes = read_indexes(source).await?;
    info!(count = indexes.len(), "Copying indexes");
    for rule in &indexes {
        match apply_ddl(target, index_ddl(rule)).await {
            SchemaOutcome::Created => {
                debug!(name = %rule.name, "Created index");
                report.indexes_created += 1;
            }
            SchemaOutcome::AlreadyExists => {
                info!(name = %rule.name, "Index already exists in target");
                report.already_existing += 1;
            }
            SchemaOutcome::Skipped(reason) => {
                warn!(name = %rule.name, %reason, "Skipping index");
                report.skipped += 1;
            }
            SchemaOutcome::Failed(e) => {
                warn!(name = %rule.name, error = %e, "Failed to create index");
                report.failed += 1;
            }
        }
    }

    info!(
        constraints = report.constraints_created,
        indexes = report.indexes_created,
        existing = report.already_existing,
        skipped = report.skipped,
        failed = report.failed,
        "Schema copied"
    );
    Ok(report)
}
