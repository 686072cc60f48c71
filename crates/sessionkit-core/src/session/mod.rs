//! Session lifecycle: state machine, restoration, single-flight refresh
//! and route guarding.
//!
//! `SessionManager` owns the in-memory `Session` and publishes every
//! transition on a watch channel. Tokens live in a `TokenStore`; the
//! manager writes them before publishing an authenticated state.

pub mod guard;
pub mod manager;
pub mod refresh;
pub mod state;

pub use guard::{RouteDecision, RouteGuard};
pub use manager::SessionManager;
pub use refresh::TokenRefresher;
pub use state::{Session, SessionState};
