use anyhow::{Context, Result};
use keyring::Entry;

use crate::config::APP_NAME;

/// Login passwords kept in the OS keychain so the login form can be pre-filled.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(auth_id: &str) -> Result<Entry> {
        Entry::new(APP_NAME, auth_id).context("Failed to create keyring entry")
    }

    /// Remember the password for a login id
    pub fn store(auth_id: &str, password: &str) -> Result<()> {
        Self::entry(auth_id)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    pub fn get_password(auth_id: &str) -> Result<String> {
        Self::entry(auth_id)?
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Forget the password for a login id. A missing entry is not an error.
    pub fn delete(auth_id: &str) -> Result<()> {
        match Self::entry(auth_id)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}
