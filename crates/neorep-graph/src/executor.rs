//! Query execution boundary.
//!
//! Every stage talks to the databases through [`QueryExecutor`], so the
//! replication logic never depends on the driver directly.

use std::collections::BTreeMap;

use async_trait::async_trait;
use neo4rs::{BoltMap, BoltType, DeError};
use serde::de::DeserializeOwned;

use neorep_core::{properties_from_bolt, NeorepError, NeorepResult, Properties};

use crate::cypher;

/// A Cypher statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    text: String,
    params: BTreeMap<String, BoltType>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
        }
    }

    /// Bind a parameter, replacing any previous value for `key`.
    pub fn param(mut self, key: &str, value: impl Into<BoltType>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &BTreeMap<String, BoltType> {
        &self.params
    }

    /// Look up a bound parameter.
    pub fn get_param(&self, key: &str) -> Option<&BoltType> {
        self.params.get(key)
    }
}

/// One result row with named columns, values kept in Bolt form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: BoltMap,
}

impl Record {
    pub fn new(columns: BoltMap) -> Self {
        Self { columns }
    }

    /// Raw value of a column.
    pub fn value(&self, column: &str) -> Option<&BoltType> {
        self.columns.value.get(column)
    }

    /// Decode a column into `T`. A missing column is an error.
    pub fn get<T: DeserializeOwned>(&self, column: &str) -> NeorepResult<T> {
        self.columns.get::<T>(column).map_err(|e| decode_error(column, e))
    }

    /// Decode a column that may be missing or null.
    pub fn get_opt<T: DeserializeOwned>(&self, column: &str) -> NeorepResult<Option<T>> {
        match self.value(column) {
            None | Some(BoltType::Null(_)) => Ok(None),
            Some(_) => self.get(column).map(Some),
        }
    }

    /// Convert a numeric column to a plain integer. Integral floats pass.
    pub fn get_i64(&self, column: &str) -> NeorepResult<i64> {
        match self.value(column) {
            Some(BoltType::Integer(i)) => Ok(i.value),
            Some(BoltType::Float(f)) if f.value.fract() == 0.0 => Ok(f.value as i64),
            Some(BoltType::Float(f)) => Err(NeorepError::decode(column, format!("{} is not an integer", f.value))),
            Some(other) => Err(NeorepError::decode(column, format!("expected a number, got {other:?}"))),
            None => Err(NeorepError::decode(column, "column not present in result")),
        }
    }

    /// A map column as a property map, untouched. Missing or null is empty.
    pub fn get_properties(&self, column: &str) -> NeorepResult<Properties> {
        match self.value(column) {
            None | Some(BoltType::Null(_)) => Ok(Properties::new()),
            Some(BoltType::Map(map)) => Ok(properties_from_bolt(map)),
            Some(other) => Err(NeorepError::decode(column, format!("expected a map, got {other:?}"))),
        }
    }

    pub fn columns(&self) -> &BoltMap {
        &self.columns
    }
}

impl From<BoltMap> for Record {
    fn from(columns: BoltMap) -> Self {
        Self::new(columns)
    }
}

impl FromIterator<(String, BoltType)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, BoltType)>>(iter: I) -> Self {
        let mut columns = BoltMap::default();
        for (name, value) in iter {
            columns.put(name.into(), value);
        }
        Self::new(columns)
    }
}

fn decode_error(column: &str, err: DeError) -> NeorepError {
    match err {
        DeError::NoSuchProperty => NeorepError::decode(column, "column not present in result"),
        other => NeorepError::decode(column, other.to_string()),
    }
}

/// Runs statements against one database.
///
/// Each call is an independent unit of work; implementations must release any
/// per-call session before returning, on success or failure.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement and collect every result row.
    async fn run(&self, statement: Statement) -> NeorepResult<Vec<Record>>;

    /// Trivial round trip used by connection tests.
    async fn ping(&self) -> NeorepResult<()> {
        self.run(Statement::new(cypher::PING)).await.map(|_| ())
    }

    /// Run a statement returning a single integer column, `0` on an empty result.
    async fn query_count(&self, statement: Statement, column: &str) -> NeorepResult<u64> {
        let rows = self.run(statement).await?;
        match rows.first() {
            Some(row) => Ok(row.get_i64(column)?.max(0) as u64),
            None => Ok(0),
        }
    }
}
