use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthService};
use crate::models::UserProfile;

use super::storage::{SessionStorage, StorageError, AUTH_TOKEN_KEY, USER_DATA_KEY};

/// Point-in-time view of the session.
///
/// `is_authenticated` implies both `access_token` and `user` are present.
/// `is_initialized` flips to true after the first `check_auth_status` (or
/// `login`) and stays true.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub is_initialized: bool,
    pub access_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl SessionSnapshot {
    fn authenticated(token: String, user: UserProfile) -> Self {
        Self {
            is_authenticated: true,
            is_initialized: true,
            access_token: Some(token),
            user: Some(user),
        }
    }

    fn signed_out() -> Self {
        Self {
            is_authenticated: false,
            is_initialized: true,
            access_token: None,
            user: None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

/// Single source of truth for authentication state.
///
/// Shared as `Arc<SessionStore>` and handed explicitly to the API client and
/// the page controllers. State lives in a `watch` channel so the UI can react
/// when a failed refresh forces a logout.
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    auth: AuthService,
    preserve_session_on_network_error: bool,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionStore {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        auth: AuthService,
        preserve_session_on_network_error: bool,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            storage,
            auth,
            preserve_session_on_network_error,
            state,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    /// Token held in memory for the current session.
    pub fn current_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn auth_service(&self) -> &AuthService {
        &self.auth
    }

    /// Token currently in persisted storage. Read errors are logged and
    /// treated as "no token".
    pub fn persisted_token(&self) -> Option<String> {
        match self.storage.get(AUTH_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                None
            }
        }
    }

    fn load_persisted(&self) -> Result<Option<(String, UserProfile)>, StorageError> {
        let token = self.storage.get(AUTH_TOKEN_KEY)?.filter(|t| !t.is_empty());
        let user = self.storage.get(USER_DATA_KEY)?;
        match (token, user) {
            (Some(token), Some(user)) => Ok(Some((token, serde_json::from_str(&user)?))),
            _ => Ok(None),
        }
    }

    fn set_authenticated(&self, token: String, user: UserProfile) {
        self.state
            .send_replace(SessionSnapshot::authenticated(token, user));
    }

    fn set_signed_out(&self) {
        self.state.send_replace(SessionSnapshot::signed_out());
    }

    /// Restore the session from persisted storage and settle it.
    ///
    /// Never fails: every path ends with `is_initialized == true` and either
    /// an authenticated or a signed-out state.
    pub async fn check_auth_status(&self) -> SessionSnapshot {
        let persisted = match self.load_persisted() {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                None
            }
        };

        let Some((token, user)) = persisted else {
            debug!("No persisted session");
            self.set_signed_out();
            return self.snapshot();
        };

        match self.auth.verify(&token).await {
            Ok(()) => {
                info!(username = %user.username, "Session verified");
                self.set_authenticated(token, user);
            }
            Err(ApiError::Unauthorized) => {
                info!("Persisted token rejected, attempting refresh");
                match self.rotate_token().await {
                    Some(new_token) => self.set_authenticated(new_token, user),
                    None => {
                        if let Err(e) = self.logout() {
                            warn!(error = %e, "Failed to clear session after refresh failure");
                        }
                    }
                }
            }
            Err(e) if self.preserve_session_on_network_error => {
                warn!(error = %e, "Session verification failed, keeping persisted session");
                self.set_authenticated(token, user);
            }
            Err(e) => {
                warn!(error = %e, "Session verification failed, treating as signed out");
                self.set_signed_out();
            }
        }

        self.snapshot()
    }

    /// Record a successful login: persist token and profile, then update memory.
    ///
    /// An empty `profile.username` is filled from `identifier`.
    pub fn login(
        &self,
        identifier: &str,
        mut profile: UserProfile,
        token: &str,
    ) -> Result<(), StorageError> {
        if profile.username.is_empty() {
            profile.username = identifier.to_string();
        }

        let user_json = serde_json::to_string(&profile)?;
        self.storage.set(AUTH_TOKEN_KEY, token)?;
        self.storage.set(USER_DATA_KEY, &user_json)?;

        info!(username = %profile.username, "Logged in");
        self.set_authenticated(token.to_string(), profile);
        Ok(())
    }

    /// Rotate the persisted token. Returns false without any network call when
    /// no token is persisted. Leaves `is_authenticated` alone either way.
    pub async fn refresh_token(&self) -> bool {
        self.rotate_token().await.is_some()
    }

    async fn rotate_token(&self) -> Option<String> {
        let Some(current) = self.persisted_token() else {
            debug!("No persisted token to refresh");
            return None;
        };

        let new_token = match self.auth.refresh(&current).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return None;
            }
        };

        if let Err(e) = self.storage.set(AUTH_TOKEN_KEY, &new_token) {
            warn!(error = %e, "Failed to persist refreshed token");
            return None;
        }

        self.state.send_if_modified(|state| {
            if state.access_token.is_some() {
                state.access_token = Some(new_token.clone());
                true
            } else {
                false
            }
        });

        info!("Access token refreshed");
        Some(new_token)
    }

    /// Clear persisted and in-memory session. Idempotent.
    ///
    /// Memory is cleared first so the UI never keeps showing a session whose
    /// storage could not be wiped; the storage error is still returned.
    pub fn logout(&self) -> Result<(), StorageError> {
        self.set_signed_out();

        let token_result = self.storage.remove(AUTH_TOKEN_KEY);
        let user_result = self.storage.remove(USER_DATA_KEY);
        info!("Logged out");
        token_result.and(user_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{json_response, status_response, FailingStorage, Harness, TEST_BASE_URL};
    use serde_json::json;

    fn alice() -> UserProfile {
        UserProfile {
            username: "alice".to_string(),
            name: Some("Alice".to_string()),
            ..Default::default()
        }
    }

    fn assert_invariant(snapshot: &SessionSnapshot) {
        if snapshot.is_authenticated {
            assert!(snapshot.access_token.is_some());
            assert!(snapshot.user.is_some());
        }
    }

    #[test]
    fn test_login_persists_token_and_profile() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "tok123").unwrap();

        assert_eq!(h.storage.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));
        let stored: UserProfile =
            serde_json::from_str(&h.storage.get(USER_DATA_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, alice());

        let snapshot = h.session.snapshot();
        assert!(snapshot.is_authenticated);
        assert!(snapshot.is_initialized);
        assert_eq!(snapshot.access_token.as_deref(), Some("tok123"));
        assert_eq!(snapshot.user, Some(alice()));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[test]
    fn test_login_fills_username_from_identifier() {
        let h = Harness::new(true);
        h.session
            .login("bob", UserProfile::default(), "tok")
            .unwrap();
        assert_eq!(h.session.snapshot().username(), Some("bob"));
    }

    #[test]
    fn test_login_storage_failure_propagates() {
        let h = Harness::new(true);
        let session = SessionStore::new(
            Arc::new(FailingStorage),
            AuthService::new(h.transport.clone(), TEST_BASE_URL),
            true,
        );
        assert!(session.login("alice", alice(), "tok123").is_err());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_check_without_persisted_token() {
        let h = Harness::new(true);
        let snapshot = h.session.check_auth_status().await;

        assert_eq!(
            snapshot,
            SessionSnapshot {
                is_authenticated: false,
                is_initialized: true,
                access_token: None,
                user: None,
            }
        );
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_login_then_check_keeps_user() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "tok123").unwrap();
        h.respond(status_response(200));

        let snapshot = h.session.check_auth_status().await;
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.user, Some(alice()));
        assert_eq!(h.transport.urls(), vec![format!("{}/api/v1/auth/verify", TEST_BASE_URL)]);
        assert_eq!(h.transport.requests()[0].bearer_token(), Some("tok123"));
    }

    #[tokio::test]
    async fn test_logout_then_check_is_signed_out() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "tok123").unwrap();
        h.session.logout().unwrap();

        let snapshot = h.session.check_auth_status().await;
        assert!(!snapshot.is_authenticated);
        assert!(snapshot.user.is_none());
        assert!(snapshot.is_initialized);
        assert_eq!(h.transport.request_count(), 0);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let h = Harness::new(true);
        h.session.logout().unwrap();
        h.session.logout().unwrap();
        assert!(!h.session.is_authenticated());
        assert!(h.session.snapshot().is_initialized);
    }

    #[tokio::test]
    async fn test_network_error_preserves_session() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "tok123").unwrap();
        h.fail(ApiError::Timeout);

        let snapshot = h.session.check_auth_status().await;
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.user, Some(alice()));
        assert_invariant(&snapshot);
    }

    #[tokio::test]
    async fn test_network_error_without_preservation_signs_out_in_memory_only() {
        let h = Harness::new(false);
        h.session.login("alice", alice(), "tok123").unwrap();
        h.respond(status_response(503));

        let snapshot = h.session.check_auth_status().await;
        assert!(!snapshot.is_authenticated);
        assert!(snapshot.is_initialized);
        // Storage is left for the next attempt
        assert_eq!(h.storage.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("tok123"));
        assert_eq!(h.storage.token_clears(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_during_check() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "old").unwrap();
        h.respond(status_response(401))
            .respond(json_response(200, json!({"access_token": "new"})));

        let snapshot = h.session.check_auth_status().await;
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.access_token.as_deref(), Some("new"));
        assert_eq!(h.storage.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("new"));
        assert_eq!(h.transport.requests()[1].bearer_token(), Some("old"));
    }

    #[tokio::test]
    async fn test_failed_refresh_during_check_logs_out() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "old").unwrap();
        h.respond(status_response(401)).respond(status_response(401));

        let snapshot = h.session.check_auth_status().await;
        assert!(!snapshot.is_authenticated);
        assert!(snapshot.is_initialized);
        assert!(h.storage.get(AUTH_TOKEN_KEY).unwrap().is_none());
        assert!(h.storage.get(USER_DATA_KEY).unwrap().is_none());
        assert_eq!(h.storage.token_clears(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_user_data_is_treated_as_signed_out() {
        let h = Harness::new(true);
        h.storage.set(AUTH_TOKEN_KEY, "tok").unwrap();
        h.storage.set(USER_DATA_KEY, "{not json").unwrap();

        let snapshot = h.session.check_auth_status().await;
        assert!(!snapshot.is_authenticated);
        assert!(snapshot.is_initialized);
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_without_token_makes_no_call() {
        let h = Harness::new(true);
        assert!(!h.session.refresh_token().await);
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_does_not_change_authentication() {
        let h = Harness::new(true);
        h.storage.set(AUTH_TOKEN_KEY, "old").unwrap();
        h.respond(json_response(200, json!({"access_token": "new"})));

        assert!(h.session.refresh_token().await);
        assert_eq!(h.storage.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("new"));
        // Not authenticated before, still not authenticated
        assert!(!h.session.is_authenticated());
        assert_invariant(&h.session.snapshot());
    }

    #[tokio::test]
    async fn test_refresh_updates_in_memory_token() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "old").unwrap();
        h.respond(json_response(200, json!({"access_token": "new"})));

        assert!(h.session.refresh_token().await);
        let snapshot = h.session.snapshot();
        assert_eq!(snapshot.access_token.as_deref(), Some("new"));
        assert!(snapshot.is_authenticated);
    }

    #[tokio::test]
    async fn test_subscribers_see_forced_logout() {
        let h = Harness::new(true);
        h.session.login("alice", alice(), "tok").unwrap();
        let mut rx = h.session.subscribe();
        rx.borrow_and_update();

        h.session.logout().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_authenticated);
    }
}
