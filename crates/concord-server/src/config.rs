use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use concord_directory::DirectoryConfig;
use concord_reputation::ReputationPolicy;

/// Top-level configuration for the concord service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcordConfig {
    /// State directory path.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Listen address for the HTTP surface.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Upper bound for agent trust scores.
    #[serde(default = "default_max_score")]
    pub max_score: u64,

    /// Trust score assigned at registration and targeted by decay.
    #[serde(default = "default_baseline_score")]
    pub baseline_score: u64,

    /// Default record TTL when a submission names none.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: i64,

    /// Reputation delta table.
    #[serde(default)]
    pub policy: ReputationPolicy,
}

fn default_state_dir() -> String {
    "~/.concord".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8900".to_string()
}

fn default_max_score() -> u64 {
    100
}

fn default_baseline_score() -> u64 {
    50
}

fn default_ttl_secs() -> i64 {
    300
}

impl Default for ConcordConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            bind_addr: default_bind_addr(),
            max_score: default_max_score(),
            baseline_score: default_baseline_score(),
            default_ttl_secs: default_ttl_secs(),
            policy: ReputationPolicy::default(),
        }
    }
}

impl ConcordConfig {
    /// Config file path within the state directory.
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// Load config from disk. Returns default if not found.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::config_path(state_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = Self::config_path(state_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn directory_config(&self) -> DirectoryConfig {
        DirectoryConfig {
            max_score: self.max_score,
            baseline_score: self.baseline_score,
        }
    }
}
