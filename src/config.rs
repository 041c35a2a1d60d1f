use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::poller::PollConfig;

const CONFIG_PATH: &str = ".codegen/config.toml";

/// Workspace-level settings from `.codegen/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Delay between two status queries.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wall-clock budget for one generation, measured from poll start.
    #[serde(default = "default_max_poll_duration_secs")]
    pub max_poll_duration_secs: u64,
    /// Error code attached to code-generation poll timeouts.
    #[serde(default = "default_timeout_code")]
    pub timeout_code: String,
    /// Iterations allowed per conversation when the server reports no
    /// counts (0 = unlimited).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_poll_duration_secs() -> u64 {
    15 * 60
}

fn default_timeout_code() -> String {
    "CodeGenTimeout".to_string()
}

fn default_max_iterations() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_duration_secs: default_max_poll_duration_secs(),
            timeout_code: default_timeout_code(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl Settings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_duration: Duration::from_secs(self.max_poll_duration_secs),
        }
    }
}

/// Load settings from `.codegen/config.toml` under `workspace_root`.
///
/// Falls back to defaults if the file is missing.
pub fn load(workspace_root: &Path) -> Result<Settings> {
    let path = workspace_root.join(CONFIG_PATH);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))?;
    if settings.poll_interval_ms == 0 {
        anyhow::bail!("{}: poll_interval_ms must be greater than zero", path.display());
    }
    Ok(settings)
}
