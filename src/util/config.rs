//! Settings file support for berth.
//!
//! Berth reads settings from two locations:
//! - Global: `~/.berth/config.toml` - User-wide defaults
//! - Project: `<repo root>/.berth/config.toml` - Repository settings
//!
//! Project settings take precedence over global settings, and command-line
//! flags take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::config::{Config, ConfigError};

/// Contents of a settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Recognized build file names; the first is used for new files.
    pub build_file_names: Option<Vec<String>>,

    /// Import path of the repository root.
    pub prefix: Option<String>,

    /// Repository roots that don't need discovery.
    #[serde(default)]
    pub known_imports: Vec<String>,

    /// Dependency mode (external, vendored)
    pub external: Option<String>,

    /// Proto mode (default, disable, legacy)
    pub proto: Option<String>,

    /// Structure mode (hierarchical, flat)
    pub structure: Option<String>,

    /// Comma-separated build tags.
    pub build_tags: Option<String>,

    /// Source language plug-in.
    pub language: Option<String>,
}

impl Settings {
    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load settings with fallback to defaults if the file doesn't exist or
    /// can't be read.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge other settings into these (other takes precedence).
    pub fn merge(&mut self, other: Settings) {
        if other.build_file_names.is_some() {
            self.build_file_names = other.build_file_names;
        }
        if other.prefix.is_some() {
            self.prefix = other.prefix;
        }
        // Known imports accumulate across files.
        for imp in other.known_imports {
            if !self.known_imports.contains(&imp) {
                self.known_imports.push(imp);
            }
        }
        if other.external.is_some() {
            self.external = other.external;
        }
        if other.proto.is_some() {
            self.proto = other.proto;
        }
        if other.structure.is_some() {
            self.structure = other.structure;
        }
        if other.build_tags.is_some() {
            self.build_tags = other.build_tags;
        }
        if other.language.is_some() {
            self.language = other.language;
        }
    }

    /// Write the settings onto a run configuration.
    pub fn apply(&self, config: &mut Config) -> Result<(), ConfigError> {
        if let Some(names) = &self.build_file_names {
            config.valid_build_file_names = names.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        config.known_imports.extend(self.known_imports.iter().cloned());
        if let Some(mode) = &self.external {
            config.dep_mode = mode.parse()?;
        }
        if let Some(mode) = &self.proto {
            config.proto_mode = mode.parse()?;
            config.proto_mode_explicit = true;
        }
        if let Some(mode) = &self.structure {
            config.structure_mode = mode.parse()?;
        }
        if let Some(tags) = &self.build_tags {
            config.set_build_tags(tags)?;
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        Ok(())
    }
}

/// Load merged settings from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project settings (.berth/config.toml)
/// 2. Global settings (~/.berth/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Some(global_path) = global_path.filter(|p| p.exists()) {
        settings.merge(Settings::load_or_default(global_path));
    }

    if project_path.exists() {
        settings.merge(Settings::load_or_default(project_path));
    }

    settings
}

/// Get the global berth config directory (~/.berth).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".berth"))
}

/// Get the global settings path (~/.berth/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project settings path (.berth/config.toml).
pub fn project_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".berth").join("config.toml")
}
