//! Protocol client for the authentication server.
//!
//! Each call maps a non-2xx response to exactly one `AuthError` kind and
//! never retries; retry policy lives in the authenticated client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ApiRequest, ApiResponse, AuthError, Transport};
use crate::models::{AuthSession, Credentials, TokenPair, User};

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, AuthError>;
    async fn register(&self, credentials: &Credentials) -> Result<AuthSession, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
    async fn current_user(&self, access_token: &str) -> Result<User, AuthError>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// How the user for a fresh login session is obtained.
///
/// `POST /login` answers with a bare `{token}`; there is no account in
/// the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginUser {
    /// Build the user locally from the submitted username.
    #[default]
    Placeholder,
    /// Look the user up with `GET /users/me` using the new token.
    Fetch,
}

/// `AuthGateway` over HTTP.
#[derive(Clone)]
pub struct HttpAuthGateway {
    transport: Arc<dyn Transport>,
    base_url: String,
    login_user: LoginUser,
}

impl HttpAuthGateway {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            login_user: LoginUser::default(),
        }
    }

    pub fn with_login_user(mut self, login_user: LoginUser) -> Self {
        self.login_user = login_user;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 5xx is a server fault for login and register; everything else is
    /// mapped by the caller.
    fn server_error(response: &ApiResponse) -> Option<AuthError> {
        response
            .status
            .is_server_error()
            .then(|| AuthError::Server(AuthError::truncate_body(&response.text())))
    }

    fn registration_reason(response: &ApiResponse) -> String {
        response
            .json::<ErrorResponse>()
            .ok()
            .and_then(|e| e.error)
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "Registration failed".to_string())
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        let request = ApiRequest::post(self.url("/login"))
            .basic(&credentials.username, &credentials.password)?
            .header(reqwest::header::CONTENT_TYPE, "application/json")?;

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            debug!(status = %response.status, "Login rejected");
            return Err(Self::server_error(&response).unwrap_or(AuthError::InvalidCredentials));
        }

        let login: LoginResponse = response.json()?;
        let tokens = TokenPair::single(login.token);

        let user = match self.login_user {
            LoginUser::Placeholder => User::placeholder(&credentials.username),
            LoginUser::Fetch => self.current_user(&tokens.access_token).await?,
        };

        Ok(AuthSession { tokens, user })
    }

    async fn register(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        let request = ApiRequest::post(self.url("/auth/register")).json(credentials)?;

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            if let Some(err) = Self::server_error(&response) {
                return Err(err);
            }
            let reason = Self::registration_reason(&response);
            debug!(status = %response.status, %reason, "Registration rejected");
            return Err(AuthError::RegistrationFailed(reason));
        }

        response.json()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let request =
            ApiRequest::post(self.url("/auth/refresh")).json(&RefreshRequest { refresh_token })?;

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            // Any refusal, 5xx included, means the pair cannot be renewed
            debug!(status = %response.status, "Refresh rejected");
            return Err(AuthError::RefreshRejected);
        }

        response.json()
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let request =
            ApiRequest::post(self.url("/auth/logout")).json(&RefreshRequest { refresh_token })?;

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            warn!(status = %response.status, "Server did not acknowledge logout");
            return Err(AuthError::from_status(response.status, &response.text()));
        }
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> Result<User, AuthError> {
        let request = ApiRequest::get(self.url("/users/me")).bearer(access_token)?;

        let response = self.transport.execute(request).await?;
        let response = response.error_for_status()?;
        response.json()
    }
}
