//! Authentication state for the portal client.
//!
//! This module provides:
//! - `SessionStore`: the session's single source of truth (check, login, refresh, logout)
//! - `SessionStorage`: persisted `auth_token` / `user_data` keys, file-backed or in memory
//! - `CredentialStore`: OS keychain storage for the last login password

pub mod credentials;
pub mod session;
pub mod storage;

pub use credentials::CredentialStore;
pub use session::{SessionSnapshot, SessionStore};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StorageError};
