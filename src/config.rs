//! Configuration Management
//!
//! Handles persistent configuration storage for azrm.

use crate::arm::client::DEFAULT_ENDPOINT;
use crate::arm::poller::PollOptions;
use crate::resource::provider::DEFAULT_CONCURRENCY;
use crate::resource::validate::is_subscription_id;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Default subscription ID
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// ARM endpoint, for sovereign clouds or test servers
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Seconds between polls of a long-running operation
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Give up on a long-running operation after this many seconds
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
    /// Concurrent reads during refresh
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("azrm").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        Self::load_from(&path)
    }

    /// Load configuration from `path`, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective subscription (CLI > config > environment / az default)
    pub fn effective_subscription(&self, cli: Option<&str>) -> String {
        cli.map(|s| s.to_string())
            .or_else(|| self.subscription_id.clone())
            .or_else(crate::arm::auth::get_default_subscription)
            .unwrap_or_default()
    }

    /// Get effective endpoint (CLI > config > public cloud)
    pub fn effective_endpoint(&self, cli: Option<&str>) -> String {
        cli.map(|s| s.to_string())
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Polling cadence for long-running operations
    pub fn poll_options(&self) -> PollOptions {
        let defaults = PollOptions::default();
        PollOptions {
            interval: self
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            timeout: self
                .operation_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1)
    }

    /// Set the default subscription. Only GUIDs are accepted.
    pub fn set_subscription(&mut self, subscription_id: &str) -> Result<()> {
        if !is_subscription_id(subscription_id) {
            bail!("Invalid subscription id {:?}: must be a GUID", subscription_id);
        }
        self.subscription_id = Some(subscription_id.to_string());
        Ok(())
    }
}
