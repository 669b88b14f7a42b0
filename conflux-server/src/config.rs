//! Server configuration file.

use anyhow::{Context, Result};
use conflux_compose::ComposeConfig;
use conflux_sources::StaticSourceConfig;
use conflux_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Server configuration, read from a JSON file.
///
/// ```json
/// {
///   "engine": { "merge_order": "fragment_id" },
///   "registry": { "channel": { "capacity": 1024 } },
///   "sources": { "fragments": { "...": { "composition_key": "app-1" } } }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub engine: ComposeConfig,
    pub registry: StoreConfig,
    pub sources: StaticSourceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            engine: ComposeConfig::named("applications"),
            registry: StoreConfig::named("fragments"),
            sources: StaticSourceConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
