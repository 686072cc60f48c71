use reqwest::StatusCode;
use thiserror::Error;

/// Failure kinds surfaced by the gateway, the transport and the
/// authenticated client.
///
/// `Clone` because a single shared refresh outcome is handed to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Refresh token rejected - please log in again")]
    RefreshRejected,

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Generic mapping for responses outside the auth endpoints.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => AuthError::Unauthorized,
            500..=599 => AuthError::Server(truncated),
            _ => AuthError::UnexpectedStatus {
                status,
                body: truncated,
            },
        }
    }

    /// True for failures caused by the transport rather than the server.
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::Network(_))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::InvalidResponse(err.to_string())
    }
}
