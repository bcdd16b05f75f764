//! Configuration layer: `AppConfig` loaded from an optional TOML file
//! plus environment-variable overrides, covering the server bind
//! address, storage root/durability mode, and logging.
//!
//! Follows the same `config`-crate-based load shape as the prior
//! configuration loader: an optional file layered under prefixed
//! environment variables, deserialized once into nested section structs.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Loads configuration from an optional TOML file (path from
    /// `EVENTLOG_CONFIG`, default `config.toml`, read only if it exists)
    /// layered under `EVENTLOG_`-prefixed environment variables with `_`
    /// as the nesting separator (e.g. `EVENTLOG_SERVER_PORT=9000`).
    pub fn load() -> Result<Self> {
        let config_path = env::var("EVENTLOG_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

        let mut builder = config::Config::builder();
        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EVENTLOG")
                .separator("_")
                .try_parsing(true),
        );

        let settings = builder.build().context("failed to build configuration sources")?;
        let config: Self = settings
            .try_deserialize()
            .context("failed to deserialize configuration")?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Durability mode: controls whether commits fsync and whether the
/// namespace store manager touches disk at all. Semantics are unaffected
/// — only durability/latency tradeoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Every commit fsyncs; the default for a real deployment.
    #[default]
    Production,
    /// On-disk, but without forcing a sync on every commit — faster test
    /// runs that still exercise the real backend and its file layout.
    Test,
    /// Never touches disk; torn down with the process. Used by unit and
    /// integration tests that don't need persistence.
    InMemory,
}

impl Durability {
    /// The `redb::Durability` a store opened under this mode should use
    /// for its write transactions, or `None` when the mode skips disk
    /// entirely (the namespace store manager branches on that case
    /// itself rather than opening a `redb::Database` at all).
    pub fn redb_durability(self) -> redb::Durability {
        match self {
            Durability::Production => redb::Durability::Immediate,
            Durability::Test => redb::Durability::Eventual,
            Durability::InMemory => redb::Durability::Eventual,
        }
    }

    pub fn is_in_memory(self) -> bool {
        matches!(self, Durability::InMemory)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub data_dir: String,
    pub durability: Durability,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            durability: Durability::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::default() }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
