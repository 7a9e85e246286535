//! Node copy stage.
//!
//! Pages through every source node, groups each page by label set and
//! bulk-creates one group per statement in the target. Every created node
//! carries the source id in the correlation property.

use std::collections::BTreeMap;

use neo4rs::{BoltList, BoltMap, BoltType};
use tracing::debug;

use neorep_core::{properties_to_bolt, NeorepResult, NodeRecord};

use crate::cypher;
use crate::executor::{QueryExecutor, Record, Statement};

/// Nodes sharing one canonical label set.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGroup {
    /// Sorted labels, empty for unlabeled nodes.
    pub labels: Vec<String>,
    pub nodes: Vec<NodeRecord>,
}

fn node_from_record(record: &Record) -> NeorepResult<NodeRecord> {
    Ok(NodeRecord {
        id: record.get_i64("nodeId")?,
        labels: record.get_opt::<Vec<String>>("labels")?.unwrap_or_default(),
        properties: record.get_properties("properties")?,
    })
}

/// Fetch one page of source nodes.
pub async fn fetch_nodes<E: QueryExecutor + ?Sized>(source: &E, skip: u64, limit: usize) -> NeorepResult<Vec<NodeRecord>> {
    let statement = Statement::new(cypher::FETCH_NODES)
        .param("skip", skip as i64)
        .param("limit", limit as i64);
    source.run(statement).await?.iter().map(node_from_record).collect()
}

/// Group nodes by canonical label key, keeping page order within each group.
pub fn group_by_labels(nodes: Vec<NodeRecord>) -> BTreeMap<String, LabelGroup> {
    let mut groups: BTreeMap<String, LabelGroup> = BTreeMap::new();
    for node in nodes {
        groups
            .entry(node.label_key())
            .or_insert_with(|| LabelGroup {
                labels: node.sorted_labels(),
                nodes: Vec::new(),
            })
            .nodes
            .push(node);
    }
    groups
}

/// The `$nodes` parameter: a list of `{nodeId, properties}` maps.
pub(crate) fn node_payload(nodes: &[NodeRecord]) -> BoltType {
    let mut payload = BoltList::with_capacity(nodes.len());
    for node in nodes {
        let mut item = BoltMap::with_capacity(2);
        item.put("nodeId".into(), node.id.into());
        item.put("properties".into(), properties_to_bolt(&node.properties));
        payload.push(BoltType::Map(item));
    }
    BoltType::List(payload)
}

/// Create one label group in the target.
pub async fn write_group<E: QueryExecutor + ?Sized>(target: &E, group: &LabelGroup) -> NeorepResult<()> {
    let payload = node_payload(&group.nodes);
    let statement = Statement::new(cypher::create_nodes(&group.labels)).param("nodes", payload);
    target.run(statement).await?;
    Ok(())
}

/// Copy every source node into the target.
///
/// `on_page` receives the cumulative number of nodes processed after each
/// page; an error from it stops the copy. Returns the total copied.
pub async fn copy_nodes<S, T, F>(source: &S, target: &T, batch_size: usize, mut on_page: F) -> NeorepResult<u64>
where
    S: QueryExecutor + ?Sized,
    T: QueryExecutor + ?Sized,
    F: FnMut(u64) -> NeorepResult<()>,
{
    let batch_size = batch_size.max(1);
    let mut processed: u64 = 0;

    loop {
        let page = fetch_nodes(source, processed, batch_size).await?;
        let page_len = page.len();
        if page_len == 0 {
            break;
        }

        let groups = group_by_labels(page);
        debug!(skip = processed, nodes = page_len, groups = groups.len(), "Writing node page");
        for (key, group) in &groups {
            debug!(labels = %key, count = group.nodes.len(), "Creating node group");
            write_group(target, group).await?;
        }

        processed += page_len as u64;
        on_page(processed)?;

        if page_len < batch_size {
            break;
        }
    }

    Ok(processed)
}
