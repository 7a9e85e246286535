//! Neo4j connection client.

use async_trait::async_trait;
use neo4rs::{BoltMap, BoltString, ConfigBuilder, Graph, Query, Row};
use tracing::debug;

use neorep_core::error::UNCLASSIFIED_CODE;
use neorep_core::{GraphConfig, NeorepError, NeorepResult};

use crate::executor::{QueryExecutor, Record, Statement};
use crate::value::Columns;

/// Client for one Neo4j database.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
    endpoint: String,
}

impl GraphClient {
    /// Create a client from config.
    ///
    /// neo4rs builds its connection pool lazily, so this does not touch the
    /// network. Use [`QueryExecutor::ping`] to check the database is reachable.
    pub async fn connect(config: &GraphConfig) -> NeorepResult<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size);
        if let Some(database) = &config.database {
            builder = builder.db(database.as_str());
        }

        let neo4j_config = builder
            .build()
            .map_err(|e| NeorepError::Connection(format!("Invalid Neo4j config for {}: {e}", config.uri)))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| NeorepError::Connection(format!("Failed to create pool for {}: {e}", config.uri)))?;

        Ok(Self {
            graph,
            endpoint: config.endpoint(),
        })
    }

    /// Endpoint this client was built for.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl QueryExecutor for GraphClient {
    async fn run(&self, statement: Statement) -> NeorepResult<Vec<Record>> {
        debug!(endpoint = %self.endpoint, statement = statement.text(), "Running statement");

        let mut query = Query::new(statement.text().to_string());
        for (key, value) in statement.params() {
            query = query.param(key, value.clone());
        }

        let mut stream = self.graph.execute(query).await.map_err(query_error)?;

        let mut records = Vec::new();
        while let Some(row) = stream.next().await.map_err(query_error)? {
            records.push(record_from_row(&row)?);
        }
        Ok(records)
    }
}

/// Decode every column of a driver row, keeping property values as Bolt values.
pub(crate) fn record_from_row(row: &Row) -> NeorepResult<Record> {
    let Columns(columns) = row
        .to_strict::<Columns>()
        .map_err(|e| NeorepError::decode("*", e.to_string()))?;

    let mut map = BoltMap::with_capacity(columns.len());
    for (name, value) in columns {
        map.put(BoltString::from(name), value);
    }
    Ok(Record::new(map))
}

fn query_error(err: neo4rs::Error) -> NeorepError {
    let message = err.to_string();
    let code = status_code(&message)
        .or_else(|| status_code(&format!("{err:?}")))
        .unwrap_or_else(|| UNCLASSIFIED_CODE.to_string());
    NeorepError::query(code, message)
}

/// Pull a Neo4j status code (`Neo.ClientError.Schema.…`) out of an error message.
pub(crate) fn status_code(text: &str) -> Option<String> {
    let start = text.find("Neo.")?;
    let code: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect();
    let code = code.trim_end_matches('.');
    // Needs at least classification and category, e.g. Neo.ClientError.Schema
    if code.split('.').count() >= 3 {
        Some(code.to_string())
    } else {
        None
    }
}
