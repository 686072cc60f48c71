//! Token persistence for the session layer.
//!
//! This module provides:
//! - `TokenStore`: The key-value contract for the access/refresh pair
//! - `MemoryTokenStore`: Process-local storage, also the test double
//! - `FileTokenStore`: JSON file in the cache directory
//! - `KeyringTokenStore`: OS-level secure storage via keyring
//!
//! The stored pair is the only durable evidence of a session. Stores
//! never fail to their caller; backend problems are logged and the
//! operation degrades to "no tokens".

pub mod file;
pub mod keyring;
pub mod store;

pub use self::keyring::KeyringTokenStore;
pub use file::FileTokenStore;
pub use store::{MemoryTokenStore, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
