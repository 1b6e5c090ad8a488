//! Monitor configuration.
//!
//! ```toml
//! [connection]
//! origin = "https://deploy.example.com"
//!
//! [[hosts]]
//! id = "build-01"
//! token = "..."
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, bail};
use serde::Deserialize;

use hostlink_connection::ConnectionConfig;

/// Config file used when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "hostlink.toml";

/// One agent to keep a link to.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostEntry {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

impl MonitorConfig {
    /// Loads and validates the config at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.connection.validate()?;

        let mut seen = HashSet::new();
        for host in &config.hosts {
            if host.id.is_empty() {
                bail!("host entry with empty id");
            }
            if !seen.insert(host.id.as_str()) {
                bail!("duplicate host id: {}", host.id);
            }
        }
        Ok(config)
    }
}
