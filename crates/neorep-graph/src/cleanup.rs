//! Target clearing and correlation cleanup.

use tracing::{debug, info};

use neorep_core::NeorepResult;

use crate::cypher;
use crate::executor::{QueryExecutor, Statement};

/// Delete every node and relationship in the target, `batch_size` nodes per
/// statement. Schema is left in place. Returns the number of nodes deleted.
pub async fn clear_target<E: QueryExecutor + ?Sized>(target: &E, batch_size: usize) -> NeorepResult<u64> {
    let batch_size = batch_size.max(1);
    let mut deleted: u64 = 0;

    loop {
        let statement = Statement::new(cypher::CLEAR_BATCH).param("limit", batch_size as i64);
        let removed = target.query_count(statement, "deleted").await?;
        deleted += removed;
        debug!(removed, total = deleted, "Cleared target batch");

        if removed < batch_size as u64 {
            break;
        }
    }

    info!(nodes = deleted, "Target cleared");
    Ok(deleted)
}

/// Strip the correlation property from every target node.
pub async fn remove_correlation_property<E: QueryExecutor + ?Sized>(target: &E) -> NeorepResult<u64> {
    let cleaned = target
        .query_count(Statement::new(cypher::REMOVE_CORRELATION), "cleaned")
        .await?;
    info!(nodes = cleaned, property = cypher::CORRELATION_PROPERTY, "Removed correlation property");
    Ok(cleaned)
}

/// Number of nodes carrying the correlation property.
pub async fn count_correlated<E: QueryExecutor + ?Sized>(graph: &E) -> NeorepResult<u64> {
    graph
        .query_count(Statement::new(cypher::COUNT_CORRELATED), "count")
        .await
}
