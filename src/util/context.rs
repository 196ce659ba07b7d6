//! Global context for NAR operations.
//!
//! Provides centralized access to configuration, paths, and environment. One
//! context is created per command invocation and passed by reference to every
//! operation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::manifest::{find_manifest, MANIFEST_NAME};
use crate::util::config::{self, Config, CONFIG_DIR_NAME};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global NAR data (~/.nar/)
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Merged user and project configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    ///
    /// Configuration is read from `~/.nar/config.toml` and
    /// `{cwd}/.nar/config.toml`.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let home = config::global_config_dir().unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME));
        let global = config::global_config_path();
        let config = config::load_config(global.as_deref(), &config::project_config_path(&cwd));

        GlobalContext {
            cwd,
            home,
            verbose: false,
            config,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the NAR home directory (~/.nar/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Root of the local repository of installed modules.
    pub fn repository_dir(&self) -> PathBuf {
        match self.config.repository.path {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.cwd.join(path),
            None => self.home.join("repository"),
        }
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Find Nar.toml starting from cwd and searching upward.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        find_manifest(&self.cwd).with_context(|| {
            format!(
                "could not find {} in {} or any parent directory",
                MANIFEST_NAME,
                self.cwd.display()
            )
        })
    }
}
