//! Authenticated request client.
//!
//! Injects the stored bearer token into every request and, on a 401,
//! performs at most one shared token refresh followed by at most one
//! retry. Other statuses and transport errors pass through untouched.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiRequest, ApiResponse, AuthError, Transport};
use crate::auth::TokenStore;
use crate::models::LiveData;
use crate::session::TokenRefresher;

#[derive(Clone)]
pub struct AuthenticatedClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    refresher: TokenRefresher,
    base_url: String,
}

impl AuthenticatedClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        refresher: TokenRefresher,
    ) -> Self {
        Self {
            transport,
            store,
            refresher,
            base_url: String::new(),
        }
    }

    /// Prefix for relative paths passed to the convenience helpers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Resolve `path` against the base URL unless it is already absolute.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Send `request` with the current access token.
    ///
    /// Any Authorization header already on the request is replaced by the
    /// stored token, or removed when no token is stored.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, AuthError> {
        let sent_token = self.store.access_token();
        let first = request.with_access_token(sent_token.as_deref())?;
        let response = self.transport.execute(first).await?;

        if !response.is_unauthorized() {
            return Ok(response);
        }

        let Some(tokens) = self.store.get().filter(|t| !t.refresh_token.is_empty()) else {
            debug!(url = %request.url, "Unauthorized and no refresh token stored");
            return Ok(response);
        };

        let access_token = if sent_token.as_deref() != Some(tokens.access_token.as_str()) {
            // Someone else refreshed while this request was in flight
            debug!(url = %request.url, "Access token changed since dispatch, retrying");
            tokens.access_token
        } else {
            match self.refresher.refresh(&tokens.refresh_token).await {
                Ok(refreshed) => refreshed.access_token,
                Err(e) => {
                    debug!(url = %request.url, error = %e, "Refresh failed, returning original response");
                    return Ok(response);
                }
            }
        };

        let retry = request.with_access_token(Some(&access_token))?;
        self.transport.execute(retry).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, AuthError> {
        self.send(ApiRequest::get(self.url(path))).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        self.get(path).await?.error_for_status()?.json()
    }

    /// Fetch the protected server status payload.
    pub async fn live_data(&self) -> Result<LiveData, AuthError> {
        self.get_json("/live-data").await
    }
}
