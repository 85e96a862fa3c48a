//! Configuration loader with multi-source merging

use crate::{Paths, TransitConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    explicit_file: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "TRANSIT".to_string(),
            explicit_file: None,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "TRANSIT")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Read this file instead of the user, project and local files.
    ///
    /// Relative paths inside it resolve against the file's directory.
    /// Environment variables still apply on top.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.project_dir = parent.to_path_buf();
        }
        self.explicit_file = Some(path.to_path_buf());
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<TransitConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = TransitConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        if let Some(file) = &self.explicit_file {
            // 2-4 replaced by a single required file
            builder = builder.add_source(
                config::File::from(file.clone())
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        } else {
            // 2. User config, 3. transitlog.toml, 4. transitlog.local.toml
            for file in Paths::for_project(&self.project_dir).existing() {
                builder = builder.add_source(
                    config::File::from(file.to_path_buf())
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 5. Environment variables: TRANSIT_TOPICS__ARRIVAL_PARTITIONS=4
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut transit_config: TransitConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        transit_config
            .validate()
            .context("Configuration failed validation")?;
        transit_config.resolve_paths(&self.project_dir);

        Ok(transit_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> TransitConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartitioningMode;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .with_env_prefix("TRANSIT_TEST_DEFAULTS")
            .load()
            .expect("Failed to load config");

        assert_eq!(config.schema_registry.url, "http://localhost:8081");
        assert_eq!(config.topics.arrival_partitions, 2);
        assert!(config.storage.data_dir.is_absolute());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[broker]
bootstrap_servers = "PLAINTEXT://kafka0:19092"

[topics]
arrival_partitions = 4
arrival_partitioning = "station"

[producer]
batch_size = 10
"#;
        fs::write(project_dir.join("transitlog.toml"), config_content)
            .expect("Failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("TRANSIT_TEST_PROJECT")
            .load()
            .expect("Failed to load config");

        assert_eq!(config.broker.bootstrap_servers, "PLAINTEXT://kafka0:19092");
        assert_eq!(config.topics.arrival_partitions, 4);
        assert_eq!(config.topics.arrival_partitioning, PartitioningMode::Station);
        assert_eq!(config.producer.batch_size, 10);
        // Unset keys in a present section keep their defaults
        assert_eq!(config.topics.arrival_replication, 1);
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("transitlog.toml"),
            r#"
[schema_registry]
url = "http://registry:8081"
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("transitlog.local.toml"),
            r#"
[schema_registry]
url = "http://localhost:18081"
"#,
        )
        .expect("Failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("TRANSIT_TEST_LOCAL")
            .load()
            .expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.schema_registry.url, "http://localhost:18081");
    }

    #[test]
    fn test_invalid_values_fail_load() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("transitlog.toml"),
            "[stream]\npoll_max_records = 0\n",
        )
        .expect("Failed to write config");

        let result = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_env_prefix("TRANSIT_TEST_INVALID")
            .load();

        assert!(result.is_err());
        assert_eq!(
            ConfigLoader::new()
                .with_project_dir(project_dir)
                .with_env_prefix("TRANSIT_TEST_INVALID")
                .load_or_default(),
            TransitConfig::default()
        );
    }

    #[test]
    fn test_explicit_file_replaces_project_files() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("transitlog.toml"),
            "[producer]\nbatch_size = 5\n",
        )
        .expect("Failed to write project config");

        let custom_dir = project_dir.join("deploy");
        fs::create_dir_all(&custom_dir).expect("Failed to create dir");
        let custom = custom_dir.join("staging.toml");
        fs::write(&custom, "[topics]\narrival_partitions = 3\n").expect("Failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .with_file(&custom)
            .with_env_prefix("TRANSIT_TEST_EXPLICIT")
            .load()
            .expect("Failed to load config");

        assert_eq!(config.topics.arrival_partitions, 3);
        assert_eq!(config.producer.batch_size, 100);
        assert_eq!(config.storage.data_dir, custom_dir.join(".transitlog/data"));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let result = ConfigLoader::new()
            .with_file(temp_dir.path().join("missing.toml"))
            .with_env_prefix("TRANSIT_TEST_MISSING")
            .load();

        assert!(result.is_err());
    }

    // Environment overrides are not exercised here: the process environment
    // is shared by every test thread. They use the same mechanism as files:
    //
    // TRANSIT_STORAGE__DATA_DIR=/var/lib/transitlog
    // TRANSIT_TOPICS__PROVISION_DELAY_MS=0
}
