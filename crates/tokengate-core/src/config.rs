//! Application configuration management.
//!
//! This module handles loading and saving the configuration: the API base
//! URL, the entry route used after a session ends, which backend holds the
//! credential, and the request timeout.
//!
//! Configuration is stored at `~/.config/tokengate/config.json`. The
//! `TOKENGATE_API_URL` and `TOKENGATE_STORAGE` environment variables take
//! precedence over the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::auth::{CredentialStore, FileBackend, KeyringBackend, ENTRY_ROUTE};

/// Application name used for config/data directory paths
const APP_NAME: &str = "tokengate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default API location (local development server)
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

pub const ENV_API_URL: &str = "TOKENGATE_API_URL";
pub const ENV_STORAGE: &str = "TOKENGATE_STORAGE";

/// Where the credential is kept between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Keyring,
    #[default]
    File,
    Memory,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Ok(StorageKind::Keyring),
            "file" => Ok(StorageKind::File),
            "memory" => Ok(StorageKind::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown storage kind '{}' (expected keyring, file or memory)",
                other
            )),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::Keyring => "keyring",
            StorageKind::File => "file",
            StorageKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub entry_route: String,
    pub storage: StorageKind,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            entry_route: ENTRY_ROUTE.to_string(),
            storage: StorageKind::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from a key lookup (the process environment in `load`)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(storage) = lookup(ENV_STORAGE) {
            self.storage = storage
                .parse()
                .with_context(|| format!("Invalid {}", ENV_STORAGE))?;
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the file-backed credential and log files
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Open the credential store for the configured backend
    pub fn credential_store(&self) -> Result<CredentialStore> {
        Ok(match self.storage {
            StorageKind::Keyring => CredentialStore::new(KeyringBackend::new()),
            StorageKind::File => CredentialStore::new(FileBackend::new(self.data_dir()?)),
            StorageKind::Memory => CredentialStore::in_memory(),
        })
    }
}
