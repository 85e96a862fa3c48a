//! Configuration management for transitlog
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (TRANSIT_* prefix, `__` between section and key)
//! 2. transitlog.local.toml (gitignored, local overrides)
//! 3. transitlog.toml (git-tracked, project config)
//! 4. ~/.config/transitlog/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! An explicit file ([`ConfigLoader::with_file`]) replaces steps 2-4.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{LOCAL_FILE, PROJECT_FILE, Paths};

/// Main transitlog configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitConfig {
    pub broker: BrokerConfig,
    pub schema_registry: SchemaRegistryConfig,
    pub topics: TopicsConfig,
    pub producer: ProducerSettings,
    pub stream: StreamSettings,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub bootstrap_servers: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "PLAINTEXT://localhost:9092".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaRegistryConfig {
    pub url: String,
}

impl Default for SchemaRegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// CDC topic with raw station rows.
    pub raw_stations: String,
    /// Changelog of the derived stations table.
    pub stations_table: String,
    /// Committed read positions of the stations transformer.
    pub stations_offsets: String,
    pub arrival_prefix: String,
    /// When set, every station publishes here instead of its own topic.
    pub shared_arrivals: Option<String>,
    pub arrival_partitions: u32,
    pub arrival_replication: u16,
    pub arrival_partitioning: PartitioningMode,
    pub provision_delay_ms: u64,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            raw_stations: "org.chicago.cta.postgres.table.stations".to_string(),
            stations_table: "org.chicago.cta.stations.table.v1".to_string(),
            stations_offsets: "org.chicago.cta.stations.table.v1.offsets".to_string(),
            arrival_prefix: "org.chicago.cta.station.arrivals".to_string(),
            shared_arrivals: None,
            arrival_partitions: 2,
            arrival_replication: 1,
            arrival_partitioning: PartitioningMode::Key,
            provision_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PartitioningMode {
    /// Hash of the event key.
    #[default]
    Key,
    /// Pinned per station.
    Station,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    /// Buffered records that trigger delivery; 0 delivers only on flush.
    pub batch_size: usize,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self { batch_size: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub offset_reset: OffsetResetMode,
    pub poll_max_records: usize,
    pub idle_backoff_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            offset_reset: OffsetResetMode::Earliest,
            poll_max_records: 500,
            idle_backoff_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetResetMode {
    #[default]
    Earliest,
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the file-backed log.
    pub data_dir: PathBuf,
    /// Sync every append to disk.
    pub fsync: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".transitlog/data"),
            fsync: true,
        }
    }
}

impl TransitConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Reads a single TOML file on top of the built-in defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings no component can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.broker.bootstrap_servers.trim().is_empty() {
            return invalid("broker.bootstrap_servers is empty");
        }
        if self.schema_registry.url.trim().is_empty() {
            return invalid("schema_registry.url is empty");
        }
        if self.topics.raw_stations.is_empty()
            || self.topics.stations_table.is_empty()
            || self.topics.stations_offsets.is_empty()
        {
            return invalid("stream topic names must not be empty");
        }
        if self.topics.arrival_partitions == 0 {
            return invalid("topics.arrival_partitions must be at least 1");
        }
        if self.topics.arrival_replication == 0 {
            return invalid("topics.arrival_replication must be at least 1");
        }
        if self.stream.poll_max_records == 0 {
            return invalid("stream.poll_max_records must be at least 1");
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();

        if self.storage.data_dir.is_relative() {
            self.storage.data_dir = base.join(&self.storage.data_dir);
        }
    }
}
