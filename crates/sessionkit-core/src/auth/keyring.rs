use anyhow::{Context, Result};
use ::keyring::Entry;
use tracing::warn;

use super::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::models::TokenPair;

const SERVICE_NAME: &str = "sessionkit";

/// Keeps the token pair in the OS keychain, one entry per token.
pub struct KeyringTokenStore {
    service: String,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn read(&self, key: &str) -> Option<String> {
        let entry = self.entry(key).ok()?;
        match entry.get_password() {
            Ok(value) => Some(value),
            Err(::keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read token from keychain");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store token in keychain")
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(::keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Option<TokenPair> {
        let access = self.read(ACCESS_TOKEN_KEY)?;
        let refresh = self.read(REFRESH_TOKEN_KEY)?;
        Some(TokenPair::new(access, refresh))
    }

    fn set(&self, tokens: &TokenPair) {
        let result = self
            .write(ACCESS_TOKEN_KEY, &tokens.access_token)
            .and_then(|_| self.write(REFRESH_TOKEN_KEY, &tokens.refresh_token));
        if let Err(e) = result {
            warn!(error = %e, "Failed to store tokens in keychain");
        }
    }

    fn clear(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.delete(key) {
                warn!(key, error = %e, "Failed to clear token from keychain");
            }
        }
    }
}
