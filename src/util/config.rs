//! Configuration file support.
//!
//! Two configuration file locations are read:
//! - Global: `~/.nar/config.toml` - User-wide defaults
//! - Project: `.nar/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Settings in `Nar.toml`
//! and on the command line take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the per-user and per-project configuration directory.
pub const CONFIG_DIR_NAME: &str = ".nar";

/// User configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local repository settings
    pub repository: RepositoryConfig,

    /// Build defaults
    pub build: BuildConfig,

    /// Post-processing tool overrides
    pub tools: ToolsConfig,
}

/// Local repository of installed modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository root (default `~/.nar/repository`)
    pub path: Option<PathBuf>,
}

/// Build defaults applied when the manifest does not say otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Layout name (e.g. `NarLayout22`)
    pub layout: Option<String>,

    /// Target AOL (e.g. `x86_64-Linux-gcc`)
    pub aol: Option<String>,

    /// Build the debug configuration
    pub debug: Option<bool>,
}

/// Paths of post-processing tools, overriding PATH lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolsConfig {
    pub ranlib: Option<PathBuf>,
    pub install_name_tool: Option<PathBuf>,
    pub mt: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
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

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.repository.path.is_some() {
            self.repository.path = other.repository.path;
        }

        if other.build.layout.is_some() {
            self.build.layout = other.build.layout;
        }
        if other.build.aol.is_some() {
            self.build.aol = other.build.aol;
        }
        if other.build.debug.is_some() {
            self.build.debug = other.build.debug;
        }

        if other.tools.ranlib.is_some() {
            self.tools.ranlib = other.tools.ranlib;
        }
        if other.tools.install_name_tool.is_some() {
            self.tools.install_name_tool = other.tools.install_name_tool;
        }
        if other.tools.mt.is_some() {
            self.tools.mt = other.tools.mt;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.nar/config.toml)
/// 2. Global config (~/.nar/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global config directory (~/.nar).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR_NAME))
}

/// Get the global config path (~/.nar/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.nar/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR_NAME).join("config.toml")
}
