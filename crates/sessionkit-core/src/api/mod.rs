//! HTTP layer for the authentication server and protected resources.
//!
//! This module provides:
//! - `Transport`: The request executor seam (`ReqwestTransport` in production)
//! - `AuthGateway`: Stateless login/register/refresh/logout/current-user client
//! - `AuthenticatedClient`: Bearer injection with one-shot refresh-and-retry
//! - `AuthError`: The failure taxonomy shared by all of the above
//!
//! Login uses HTTP Basic auth; every other authenticated call presents the
//! stored access token as a bearer token.

pub mod client;
pub mod error;
pub mod gateway;
pub mod transport;

pub use client::AuthenticatedClient;
pub use error::AuthError;
pub use gateway::{AuthGateway, HttpAuthGateway, LoginUser};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, DEFAULT_REQUEST_TIMEOUT_SECS};
