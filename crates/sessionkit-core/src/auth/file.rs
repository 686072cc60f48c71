use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TokenStore;
use crate::models::TokenPair;

/// Token file name in cache directory
const TOKEN_FILE: &str = "tokens.json";

/// On-disk layout: one key per token, either may be missing.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// Keeps the token pair in a JSON file so a session survives restarts.
pub struct FileTokenStore {
    cache_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }

    fn load(path: &Path) -> Result<Option<TokenPair>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read token file")?;
        let stored: StoredTokens =
            serde_json::from_str(&contents).context("Failed to parse token file")?;

        Ok(match (stored.access_token, stored.refresh_token) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            _ => None,
        })
    }

    fn save(path: &Path, tokens: &TokenPair) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let stored = StoredTokens {
            access_token: Some(tokens.access_token.clone()),
            refresh_token: Some(tokens.refresh_token.clone()),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<TokenPair> {
        match Self::load(&self.path()) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable token file");
                None
            }
        }
    }

    fn set(&self, tokens: &TokenPair) {
        let path = self.path();
        match Self::save(&path, tokens) {
            Ok(()) => debug!(?path, "Tokens saved"),
            Err(e) => warn!(error = %e, "Failed to save tokens"),
        }
    }

    fn clear(&self) {
        let path = self.path();
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(error = %e, "Failed to remove token file");
            }
        }
    }
}
