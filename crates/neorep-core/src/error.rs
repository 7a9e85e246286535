//! Centralized error types for neorep.

use thiserror::Error;

use crate::progress::Stage;

/// Main error type for replication operations.
#[derive(Error, Debug)]
pub enum NeorepError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed [{code}]: {message}")]
    Query { code: String, message: String },

    #[error("Failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Progress observer failed: {0}")]
    Observer(#[source] anyhow::Error),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<NeorepError>,
    },
}

/// Result type for replication operations.
pub type NeorepResult<T> = Result<T, NeorepError>;

/// Code used when the database error carries no status code.
pub const UNCLASSIFIED_CODE: &str = "Neo.Unclassified";

impl NeorepError {
    /// Create a query error from a database status code and message.
    pub fn query(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a decode error for a result column.
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Attach the stage that was running when this error surfaced.
    ///
    /// Observer failures and errors already carrying a stage are returned unchanged.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Self::Observer(_) | Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage an error was raised in, if known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the database rejected a schema statement because an equivalent
    /// rule (or one with the same name) already exists.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Query { code, message } => {
                code.contains("AlreadyExists") || message.to_lowercase().contains("already exists")
            }
            Self::Stage { source, .. } => source.is_already_exists(),
            _ => false,
        }
    }
}
