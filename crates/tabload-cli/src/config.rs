//! Configuration file of the `tabload` binary
//!
//! The import settings sit at the top level; `connections.<name>` adds the
//! MySQL connection options for every name a job may reference.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tabload_driver_mysql::MySqlConnectOptions;
use tabload_import::ImportSettings;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub import: ImportSettings,
    #[serde(default)]
    pub connections: IndexMap<String, MySqlConnectOptions>,
}

impl CliConfig {
    /// `<config dir>/tabload/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("tabload").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {:?}", path))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse configuration TOML")?;
        config.import.validate()?;
        Ok(config)
    }

    pub fn connection(&self, name: &str) -> Result<&MySqlConnectOptions> {
        self.connections
            .get(name)
            .with_context(|| format!("No connection \"{}\" in the configuration", name))
    }
}
