//! Relationship copy stage.
//!
//! Relationship types cannot be parameterized, so each page is grouped by
//! type and every group gets its own statement. Endpoints are resolved in the
//! target through the correlation property written by the node stage.

use std::collections::BTreeMap;

use neo4rs::{BoltList, BoltMap, BoltType};
use serde::Serialize;
use tracing::{debug, warn};

use neorep_core::{properties_to_bolt, NeorepResult, RelationshipRecord};

use crate::cypher;
use crate::executor::{QueryExecutor, Record, Statement};

/// Counters for the relationship stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipCopyStats {
    /// Relationships read from the source.
    pub processed: u64,
    /// Relationships the target reported as created.
    pub created: u64,
}

impl RelationshipCopyStats {
    /// Relationships whose endpoints could not be matched in the target.
    pub fn unresolved(&self) -> u64 {
        self.processed.saturating_sub(self.created)
    }
}

fn relationship_from_record(record: &Record) -> NeorepResult<RelationshipRecord> {
    Ok(RelationshipRecord {
        start_id: record.get_i64("startId")?,
        end_id: record.get_i64("endId")?,
        rel_type: record.get("type")?,
        properties: record.get_properties("properties")?,
    })
}

/// Fetch one page of source relationships.
pub async fn fetch_relationships<E: QueryExecutor + ?Sized>(
    source: &E,
    skip: u64,
    limit: usize,
) -> NeorepResult<Vec<RelationshipRecord>> {
    let statement = Statement::new(cypher::FETCH_RELATIONSHIPS)
        .param("skip", skip as i64)
        .param("limit", limit as i64);
    source.run(statement).await?.iter().map(relationship_from_record).collect()
}

/// Group relationships by type, keeping page order within each group.
pub fn group_by_type(relationships: Vec<RelationshipRecord>) -> BTreeMap<String, Vec<RelationshipRecord>> {
    let mut groups: BTreeMap<String, Vec<RelationshipRecord>> = BTreeMap::new();
    for rel in relationships {
        groups.entry(rel.rel_type.clone()).or_default().push(rel);
    }
    groups
}

/// The `$rels` parameter: a list of `{startId, endId, properties}` maps.
pub(crate) fn relationship_payload(relationships: &[RelationshipRecord]) -> BoltType {
    let mut payload = BoltList::with_capacity(relationships.len());
    for rel in relationships {
        let mut item = BoltMap::with_capacity(3);
        item.put("startId".into(), rel.start_id.into());
        item.put("endId".into(), rel.end_id.into());
        item.put("properties".into(), properties_to_bolt(&rel.properties));
        payload.push(BoltType::Map(item));
    }
    BoltType::List(payload)
}

/// Create one type group in the target. Returns how many were created.
pub async fn write_group<E: QueryExecutor + ?Sized>(
    target: &E,
    rel_type: &str,
    relationships: &[RelationshipRecord],
) -> NeorepResult<u64> {
    let payload = relationship_payload(relationships);
    let statement = Statement::new(cypher::create_relationships(rel_type)).param("rels", payload);
    target.query_count(statement, "created").await
}

/// Copy every source relationship into the target.
///
/// Must run after the node stage. `on_page` receives the cumulative number of
/// relationships read after each page.
pub async fn copy_relationships<S, T, F>(
    source: &S,
    target: &T,
    batch_size: usize,
    mut on_page: F,
) -> NeorepResult<RelationshipCopyStats>
where
    S: QueryExecutor + ?Sized,
    T: QueryExecutor + ?Sized,
    F: FnMut(u64) -> NeorepResult<()>,
{
    let batch_size = batch_size.max(1);
    let mut stats = RelationshipCopyStats::default();

    loop {
        let page = fetch_relationships(source, stats.processed, batch_size).await?;
        let page_len = page.len();
        if page_len == 0 {
            break;
        }

        let groups = group_by_type(page);
        debug!(skip = stats.processed, relationships = page_len, groups = groups.len(), "Writing relationship page");
        for (rel_type, group) in &groups {
            let created = write_group(target, rel_type, group).await?;
            let expected = group.len() as u64;
            if created < expected {
                warn!(
                    rel_type = %rel_type,
                    expected,
                    created,
                    "Some relationships were not created; their endpoints are missing in the target"
                );
            }
            stats.created += created;
        }

        stats.processed += page_len as u64;
        on_page(stats.processed)?;

        if page_len < batch_size {
            break;
        }
    }

    Ok(stats)
}
