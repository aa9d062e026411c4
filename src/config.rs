use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use chrono::FixedOffset;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fixture file backing the node and series stores
    pub fixture: String,

    /// Tree browsing configuration
    #[serde(default)]
    pub tree: TreeConfig,

    /// Consumption reporting configuration
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TreeConfig {
    /// Source names shown by default; empty means any source qualifies
    #[serde(default)]
    pub sources: Vec<String>,

    /// Root path to anchor browsing at; defaults to the fixture's root
    #[serde(default)]
    pub root: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportConfig {
    /// Hours east of UTC defining local midnight for day totals
    #[serde(default)]
    pub utc_offset_hours: i32,
}

impl ReportConfig {
    /// Fixed zone for day boundaries; `None` when the configured offset is
    /// out of range.
    pub fn zone(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(fixture = %config.fixture, sources = ?config.tree.sources, "configuration loaded");
        Ok(config)
    }
}
