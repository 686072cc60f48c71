//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the authentication server URL, request timeout, token storage backend
//! and last used username.
//!
//! Configuration is stored at `~/.config/sessionkit/config.json`.
//! `SESSIONKIT_BASE_URL` overrides the stored server URL.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{LoginUser, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sessionkit";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Server used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Environment variable overriding `base_url`
pub const BASE_URL_ENV: &str = "SESSIONKIT_BASE_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl fmt::Display for TokenStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenStoreKind::File => "file",
            TokenStoreKind::Keyring => "keyring",
            TokenStoreKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

impl FromStr for TokenStoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(TokenStoreKind::File),
            "keyring" => Ok(TokenStoreKind::Keyring),
            "memory" => Ok(TokenStoreKind::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown token store '{}' (expected file, keyring or memory)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub token_store: TokenStoreKind,
    /// Look the user up after login instead of deriving it from the username
    pub fetch_user_on_login: bool,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_store: TokenStoreKind::default(),
            fetch_user_on_login: false,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
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

    /// Environment overrides take precedence over the file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn login_user(&self) -> LoginUser {
        if self.fetch_user_on_login {
            LoginUser::Fetch
        } else {
            LoginUser::Placeholder
        }
    }

    /// Build the configured token store.
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::new(self.cache_dir()?)),
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new(APP_NAME)),
            TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config::load_from(&dir.path().join("config.json")).expect("defaults");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.token_store, TokenStoreKind::File);
        assert_eq!(config.login_user(), LoginUser::Placeholder);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            base_url: "https://auth.example.com".to_string(),
            token_store: TokenStoreKind::Keyring,
            fetch_user_on_login: true,
            last_username: Some("admin".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("saved");

        let loaded = Config::load_from(&path).expect("loaded");
        assert_eq!(loaded.base_url, "https://auth.example.com");
        assert_eq!(loaded.token_store, TokenStoreKind::Keyring);
        assert_eq!(loaded.login_user(), LoginUser::Fetch);
        assert_eq!(loaded.last_username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"token_store": "memory"}"#).expect("write");

        let loaded = Config::load_from(&path).expect("loaded");
        assert_eq!(loaded.token_store, TokenStoreKind::Memory);
        assert_eq!(loaded.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_token_store_kind_parse() {
        assert_eq!("File".parse::<TokenStoreKind>().unwrap(), TokenStoreKind::File);
        assert_eq!(" keyring ".parse::<TokenStoreKind>().unwrap(), TokenStoreKind::Keyring);
        assert_eq!(TokenStoreKind::Memory.to_string(), "memory");
        assert!("redis".parse::<TokenStoreKind>().is_err());
    }
}
