use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, Result};
use crate::index::models::{CollisionPolicy, Specifier};

/// Catalog configuration, loaded from a YAML file.
///
/// ```yaml
/// stories:
///   - directory: ./src
///     files: "**/*.stories.*"
///     title_prefix: Design System
/// collision_policy: last_wins
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub stories: Vec<Specifier>,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

impl Config {
    /// Loads and validates a config file. Relative specifier roots are
    /// resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IndexerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: Config = serde_yaml::from_str(&content)
            .map_err(|e| IndexerError::Config(format!("{}: {}", path.display(), e)))?;

        if config.stories.is_empty() {
            return Err(IndexerError::Config(format!(
                "{}: at least one story specifier is required",
                path.display()
            )));
        }

        // Roots must be absolute so watcher events can be routed back to
        // their specifier by path prefix.
        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        let base = if base.is_absolute() {
            base
        } else {
            std::env::current_dir()?.join(base)
        };
        for spec in &mut config.stories {
            if spec.directory.is_relative() {
                spec.directory = base.join(&spec.directory);
            }
        }

        Ok(config)
    }
}
