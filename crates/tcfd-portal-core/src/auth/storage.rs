//! Persistent key/value storage backing the session store.
//!
//! The session is kept under two keys, `auth_token` and `user_data`, the same
//! way a browser client keeps them in local storage. Writes of the two keys are
//! independent; a crash between them leaves a half-written session, which the
//! session store treats as "no session".

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Key holding the raw bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Key holding the JSON-serialized user profile.
pub const USER_DATA_KEY: &str = "user_data";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access session storage '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session data: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key inside the session directory.
///
/// Files are written with 0600 permissions on Unix since they hold a bearer token.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn io_error(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| Self::io_error(key, e))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(key, e))?;

        let path = self.key_path(key);
        fs::write(&path, value).map_err(|e| Self::io_error(key, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, permissions).map_err(|e| Self::io_error(key, e))?;
        }

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| Self::io_error(key, e))?;
        }
        Ok(())
    }
}

/// In-process storage, used by tests and `--ephemeral` runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.values().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_storage_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("session"));

        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), None);

        storage.set(AUTH_TOKEN_KEY, "tok123").unwrap();
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));

        storage.set(AUTH_TOKEN_KEY, "tok456").unwrap();
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("tok456"));

        storage.remove(AUTH_TOKEN_KEY).unwrap();
        assert_eq!(storage.get(AUTH_TOKEN_KEY).unwrap(), None);

        // Removing a missing key is fine
        storage.remove(AUTH_TOKEN_KEY).unwrap();
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("session");

        FileStorage::new(dir.clone())
            .set(USER_DATA_KEY, r#"{"username":"alice"}"#)
            .unwrap();

        let reopened = FileStorage::new(dir);
        assert_eq!(
            reopened.get(USER_DATA_KEY).unwrap().as_deref(),
            Some(r#"{"username":"alice"}"#)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path().to_path_buf());
        storage.set(AUTH_TOKEN_KEY, "secret").unwrap();

        let metadata = fs::metadata(storage.dir().join(AUTH_TOKEN_KEY)).unwrap();
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }
}
