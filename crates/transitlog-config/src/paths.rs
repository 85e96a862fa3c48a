//! Where configuration files live.

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Checked-in project configuration.
pub const PROJECT_FILE: &str = "transitlog.toml";

/// Per-checkout overrides, kept out of version control.
pub const LOCAL_FILE: &str = "transitlog.local.toml";

/// The configuration files consulted for one project directory.
#[derive(Debug, Clone)]
pub struct Paths {
    user: Option<PathBuf>,
    project: PathBuf,
    local: PathBuf,
}

impl Paths {
    pub fn for_project(project_dir: impl AsRef<Path>) -> Self {
        let dir = project_dir.as_ref();
        Self {
            user: ProjectDirs::from("org", "transitlog", "transitlog")
                .map(|dirs| dirs.config_dir().join("config.toml")),
            project: dir.join(PROJECT_FILE),
            local: dir.join(LOCAL_FILE),
        }
    }

    /// `~/.config/transitlog/config.toml` on Linux.
    pub fn user_config_file(&self) -> Result<&Path, ConfigError> {
        self.user.as_deref().ok_or(ConfigError::NoHomeDir)
    }

    pub fn project_config_file(&self) -> &Path {
        &self.project
    }

    pub fn local_config_file(&self) -> &Path {
        &self.local
    }

    /// The files that exist, lowest precedence first.
    pub fn existing(&self) -> Vec<&Path> {
        self.user
            .as_deref()
            .into_iter()
            .chain([self.project.as_path(), self.local.as_path()])
            .filter(|path| path.exists())
            .collect()
    }
}
