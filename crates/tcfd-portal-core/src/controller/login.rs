use tracing::{info, warn};

use crate::auth::SessionStore;
use crate::models::UserProfile;

use super::{required, ActionError, ValidationError};

/// Validated credentials, ready to send.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub auth_id: String,
    password: String,
}

impl LoginAttempt {
    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Login page state.
#[derive(Debug, Default, Clone)]
pub struct LoginForm {
    pub auth_id: String,
    pub password: String,
    pub error: Option<String>,
    pub busy: bool,
}

impl LoginForm {
    pub fn with_auth_id(auth_id: impl Into<String>) -> Self {
        Self {
            auth_id: auth_id.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<LoginAttempt, ValidationError> {
        let auth_id = required(&self.auth_id, "ID")?;
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        Ok(LoginAttempt {
            auth_id: auth_id.to_string(),
            password: self.password.clone(),
        })
    }

    /// Validate and mark the form busy. A validation error is shown inline.
    pub fn begin(&mut self) -> Option<LoginAttempt> {
        match self.validate() {
            Ok(attempt) => {
                self.error = None;
                self.busy = true;
                Some(attempt)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    /// Authenticate and record the session.
    pub async fn run(session: &SessionStore, attempt: &LoginAttempt) -> Result<UserProfile, ActionError> {
        let grant = session
            .auth_service()
            .login(&attempt.auth_id, &attempt.password)
            .await?;
        session.login(&attempt.auth_id, grant.profile.clone(), &grant.token)?;
        info!(auth_id = %attempt.auth_id, "Login succeeded");
        Ok(grant.profile)
    }

    pub fn complete(&mut self, result: &Result<UserProfile, ActionError>) {
        self.busy = false;
        match result {
            Ok(_) => {
                self.password.clear();
                self.error = None;
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.error = Some(e.user_message());
            }
        }
    }

    /// begin, run and complete in one go.
    pub async fn submit(&mut self, session: &SessionStore) -> Result<UserProfile, ActionError> {
        let attempt = self.validate().map_err(|e| {
            self.error = Some(e.to_string());
            ActionError::from(e)
        })?;
        self.error = None;
        self.busy = true;
        let result = Self::run(session, &attempt).await;
        self.complete(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{json_response, Harness, TEST_BASE_URL};
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_fields_make_no_request() {
        let h = Harness::new(true);
        let mut form = LoginForm::default();
        assert!(form.submit(&h.session).await.is_err());
        assert_eq!(form.error.as_deref(), Some("ID is required"));

        form.auth_id = "alice".to_string();
        assert!(form.begin().is_none());
        assert_eq!(form.error.as_deref(), Some("Password is required"));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_login_updates_session() {
        let h = Harness::new(true);
        h.respond(json_response(
            200,
            json!({"success": true, "token": "tok123", "name": "Alice"}),
        ));

        let mut form = LoginForm::with_auth_id(" alice ");
        form.password = "pw".to_string();
        let profile = form.submit(&h.session).await.unwrap();

        assert_eq!(profile.username, "alice");
        assert!(form.password.is_empty());
        assert!(!form.busy);
        assert_eq!(h.transport.urls(), vec![format!("{}/api/v1/auth/login", TEST_BASE_URL)]);

        let snapshot = h.session.snapshot();
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.access_token.as_deref(), Some("tok123"));
        assert_eq!(snapshot.user.unwrap().display_name(), "Alice");
    }

    #[tokio::test]
    async fn test_rejected_login_shows_service_message() {
        let h = Harness::new(true);
        h.respond(json_response(
            200,
            json!({"success": false, "message": "Invalid credentials"}),
        ));

        let mut form = LoginForm::with_auth_id("alice");
        form.password = "bad".to_string();
        assert!(form.submit(&h.session).await.is_err());
        assert_eq!(form.error.as_deref(), Some("Invalid credentials"));
        assert_eq!(form.password, "bad");
        assert!(!h.session.is_authenticated());
    }
}
