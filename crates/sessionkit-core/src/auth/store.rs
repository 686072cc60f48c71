use std::sync::Mutex;

use crate::models::TokenPair;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Persists the current token pair.
///
/// All operations are synchronous and idempotent. `clear()` followed by
/// `get()` always yields `None`.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<TokenPair>;
    fn set(&self, tokens: &TokenPair);
    fn clear(&self);

    fn access_token(&self) -> Option<String> {
        self.get().map(|t| t.access_token)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get().map(|t| t.refresh_token)
    }

    fn has_tokens(&self) -> bool {
        self.get().is_some()
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<TokenPair> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, tokens: &TokenPair) {
        *self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tokens.clone());
    }

    fn clear(&self) {
        *self
            .tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }
}
