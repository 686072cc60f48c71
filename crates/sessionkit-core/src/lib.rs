//! Client-side session and authenticated-request layer.
//!
//! `SessionManager` restores, establishes and ends sessions backed by a
//! `TokenStore`; `AuthenticatedClient` sends requests with the stored
//! bearer token and transparently refreshes it once on a 401.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{
    ApiRequest, ApiResponse, AuthError, AuthGateway, AuthenticatedClient, HttpAuthGateway,
    LoginUser, ReqwestTransport, Transport,
};
pub use auth::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
pub use config::{Config, TokenStoreKind};
pub use models::{AuthSession, Credentials, LiveData, SystemMetrics, TokenPair, User};
pub use session::{RouteDecision, RouteGuard, Session, SessionManager, SessionState, TokenRefresher};
