//! CLI command implementations.

pub mod arrive;
pub mod table;
pub mod transform;
pub mod version;

use std::path::Path;

use anyhow::{Context, Result};
use transitlog_config::{ConfigLoader, TransitConfig};

/// Loads configuration from `--config` or the usual locations, then applies
/// `--data-dir`.
pub fn load_config(path: Option<&Path>, data_dir: Option<&Path>) -> Result<TransitConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("Failed to load configuration")?;

    if let Some(dir) = data_dir {
        config.storage.data_dir = dir.to_path_buf();
    }
    Ok(config)
}
