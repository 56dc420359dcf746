//! Configuration management for kinship.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (KINSHIP prefix, `__` between nested keys)
//! 2. Config file (kinship.toml)
//! 3. Defaults

use std::time::Duration;

use serde::Deserialize;

use crate::error::CoreError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct KinshipConfig {
    #[serde(default)]
    pub dgraph: DgraphSettings,

    #[serde(default)]
    pub log: LogSettings,
}

/// Where the Dgraph alpha lives and how long a command may take.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DgraphSettings {
    /// Base URL of the alpha HTTP endpoint.
    #[serde(default = "default_address")]
    pub address: String,

    /// Per-request deadline in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl DgraphSettings {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Log output settings. `RUST_LOG` overrides `filter` when set.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LogSettings {
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_address() -> String {
    "http://localhost:8080".to_string()
}

fn default_deadline_secs() -> u64 {
    10
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for DgraphSettings {
    fn default() -> Self {
        Self {
            address: default_address(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

/// Load configuration from `<file_prefix>.{toml,yaml,json,...}` (optional)
/// layered under `KINSHIP__*` environment variables.
pub fn load(file_prefix: &str) -> Result<KinshipConfig, CoreError> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("KINSHIP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(cfg.try_deserialize()?)
}
