//! Connection and run configuration.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `NEOREP_*` environment variables. The CLI applies its own flags last.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{NeorepError, NeorepResult};

/// Default number of nodes fetched per page.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "neorep.toml";

/// Configuration for connecting to one Neo4j database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Database name; the server default when unset.
    pub database: Option<String>,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: None,
            max_connections: 4,
            fetch_size: 500,
        }
    }
}

impl GraphConfig {
    /// Apply `NEOREP_<PREFIX>_{URI,USER,PASSWORD,DATABASE}` overrides.
    fn apply_env<F>(&mut self, prefix: &str, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup(&format!("NEOREP_{prefix}_URI")) {
            self.uri = uri;
        }
        if let Some(user) = lookup(&format!("NEOREP_{prefix}_USER")) {
            self.user = user;
        }
        if let Some(password) = lookup(&format!("NEOREP_{prefix}_PASSWORD")) {
            self.password = password;
        }
        if let Some(database) = lookup(&format!("NEOREP_{prefix}_DATABASE")) {
            self.database = if database.is_empty() { None } else { Some(database) };
        }
    }

    /// Human-readable endpoint, e.g. `bolt://host:7687/movies`.
    pub fn endpoint(&self) -> String {
        match &self.database {
            Some(db) => format!("{}/{}", self.uri.trim_end_matches('/'), db),
            None => self.uri.clone(),
        }
    }
}

/// Full configuration of a replication run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub source: GraphConfig,
    pub target: GraphConfig,
    pub batch_size: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            source: GraphConfig::default(),
            target: GraphConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ReplicationConfig {
    /// Parse a TOML document with `[source]` and `[target]` tables.
    pub fn from_toml_str(contents: &str) -> NeorepResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> NeorepResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Load configuration from `path` (or `neorep.toml` if present), apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> NeorepResult<Self> {
        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                Self::from_file(path)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                debug!(path = DEFAULT_CONFIG_FILE, "Loading default config file");
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `NEOREP_*` overrides using `lookup` to read variables.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> NeorepResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.source.apply_env("SOURCE", &lookup);
        self.target.apply_env("TARGET", &lookup);

        if let Some(raw) = lookup("NEOREP_BATCH_SIZE") {
            self.batch_size = raw
                .trim()
                .parse()
                .map_err(|_| NeorepError::config(format!("NEOREP_BATCH_SIZE is not a number: '{raw}'")))?;
        }
        Ok(())
    }

    /// Check the configuration is usable for a run.
    pub fn validate(&self) -> NeorepResult<()> {
        if self.batch_size == 0 {
            return Err(NeorepError::config("batch_size must be at least 1"));
        }
        if self.source.uri.trim().is_empty() {
            return Err(NeorepError::config("source uri is empty"));
        }
        if self.target.uri.trim().is_empty() {
            return Err(NeorepError::config("target uri is empty"));
        }
        // Clearing the target would wipe the source.
        if self.source.uri == self.target.uri && self.source.database == self.target.database {
            return Err(NeorepError::config(format!(
                "source and target point at the same database ({})",
                self.source.endpoint()
            )));
        }
        Ok(())
    }
}
