//! Configuration Management
//!
//! Handles persistent configuration storage for cosmotab and the desired
//! table definitions read from YAML.

use crate::azure::auth;
use crate::azure::client::{DEFAULT_ENDPOINT, DEFAULT_POLL_INTERVAL};
use crate::resource::model::DesiredState;
use crate::state::DEFAULT_STATE_FILE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-operation timeouts, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub create: u64,
    pub read: u64,
    pub update: u64,
    pub delete: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: 30,
            read: 5,
            update: 30,
            delete: 30,
        }
    }
}

impl Timeouts {
    pub fn create(&self) -> Duration {
        Duration::from_secs(self.create.saturating_mul(60))
    }

    pub fn read(&self) -> Duration {
        Duration::from_secs(self.read.saturating_mul(60))
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update.saturating_mul(60))
    }

    pub fn delete(&self) -> Duration {
        Duration::from_secs(self.delete.saturating_mul(60))
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Subscription new tables are created in
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Entra ID tenant of the service principal
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Application (client) id of the service principal
    #[serde(default)]
    pub client_id: Option<String>,
    /// Resource Manager endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Where the state file lives
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    /// Seconds between polls of a long-running operation
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Per-request HTTP timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub timeouts: Timeouts,
    /// File this configuration was loaded from
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cosmotab").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        Self::load_from(&path)
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, err);
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        config.path = Some(path.to_path_buf());
        config
    }

    /// File `save` writes to
    pub fn path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(Self::config_path)
    }

    /// Save configuration back to the file it was loaded from
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective subscription (CLI > config > environment / Azure CLI profile)
    pub fn effective_subscription(&self, cli: Option<&str>) -> Result<String> {
        let subscription = cli
            .map(|s| s.to_string())
            .or_else(|| self.subscription_id.clone())
            .or_else(auth::get_default_subscription)
            .context("No subscription configured. Pass --subscription or set ARM_SUBSCRIPTION_ID")?;

        if !auth::validate_subscription_id(&subscription) {
            anyhow::bail!("Subscription id {:?} is not a GUID", subscription);
        }

        Ok(subscription)
    }

    /// Get effective endpoint (config > default)
    pub fn effective_endpoint(&self) -> Result<url::Url> {
        let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
        url::Url::parse(endpoint).with_context(|| format!("Invalid endpoint {:?}", endpoint))
    }

    /// Get effective state path (CLI > config > ./cosmotab.state.json)
    pub fn effective_state_path(&self, cli: Option<&Path>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or_else(|| self.state_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(60))
    }

    /// Set subscription and save
    pub fn set_subscription(&mut self, subscription_id: &str) -> Result<()> {
        self.subscription_id = Some(subscription_id.to_string());
        self.save()
    }
}

/// Desired tables, keyed by address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TablesFile {
    #[serde(default)]
    pub tables: BTreeMap<String, DesiredState>,
}

impl TablesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
