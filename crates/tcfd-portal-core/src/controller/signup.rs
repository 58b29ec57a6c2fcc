use tracing::{info, warn};

use crate::api::AuthService;
use crate::models::SignupRequest;

use super::{required, ActionError, ValidationError};

/// Sign-up page state.
#[derive(Debug, Default, Clone)]
pub struct SignupForm {
    pub auth_id: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    pub email: String,
    pub company_id: String,
    pub error: Option<String>,
    pub busy: bool,
}

impl SignupForm {
    pub fn validate(&self) -> Result<SignupRequest, ValidationError> {
        let auth_id = required(&self.auth_id, "ID")?;
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        let name = required(&self.name, "Name")?;
        let email = required(&self.email, "Email")?;
        if !looks_like_email(email) {
            return Err(ValidationError::InvalidEmail);
        }
        let company_id = self.company_id.trim();

        Ok(SignupRequest {
            auth_id: auth_id.to_string(),
            auth_pw: self.password.clone(),
            name: name.to_string(),
            email: email.to_string(),
            company_id: (!company_id.is_empty()).then(|| company_id.to_string()),
        })
    }

    pub fn begin(&mut self) -> Option<SignupRequest> {
        match self.validate() {
            Ok(request) => {
                self.error = None;
                self.busy = true;
                Some(request)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    /// Create the account. Returns the service's confirmation message.
    pub async fn run(auth: &AuthService, request: &SignupRequest) -> Result<String, ActionError> {
        let message = auth.signup(request).await?;
        info!(auth_id = %request.auth_id, "Account created");
        Ok(message)
    }

    /// Apply the outcome. On success returns the id to pre-fill the login
    /// form with.
    pub fn complete(&mut self, result: &Result<String, ActionError>) -> Option<String> {
        self.busy = false;
        match result {
            Ok(_) => {
                let auth_id = self.auth_id.trim().to_string();
                *self = Self::default();
                Some(auth_id)
            }
            Err(e) => {
                warn!(error = %e, "Sign up failed");
                self.error = Some(e.user_message());
                None
            }
        }
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}
