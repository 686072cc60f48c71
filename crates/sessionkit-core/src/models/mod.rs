//! Data models for session and API entities.
//!
//! This module contains the data structures exchanged with the
//! authentication server and held by the session layer:
//!
//! - `Credentials`: Username/password pair, never persisted
//! - `TokenPair`: Access and refresh tokens, the only durable session state
//! - `User`, `AuthSession`: Server-sourced account data
//! - `LiveData`: Example protected payload served behind bearer auth

pub mod account;
pub mod live_data;

pub use account::{AuthSession, Credentials, TokenPair, User};
pub use live_data::{LiveData, SystemMetrics};
