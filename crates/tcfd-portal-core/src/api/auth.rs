//! Raw calls to the Auth service.
//!
//! These bypass the `ApiClient` interceptor on purpose: the session store uses
//! them to verify and refresh tokens, and a refresh must never trigger another
//! refresh.

use std::sync::Arc;

use tracing::debug;

use crate::models::{
    LoginGrant, LoginRequest, LoginResponse, RefreshResponse, SignupRequest, SignupResponse,
};

use super::transport::{HttpRequest, Transport};
use super::ApiError;

#[derive(Clone)]
pub struct AuthService {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl AuthService {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/auth/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Exchange credentials for a token.
    ///
    /// `{success: false, message}` bodies become `ApiError::Service(message)`,
    /// whatever the HTTP status.
    pub async fn login(&self, auth_id: &str, auth_pw: &str) -> Result<LoginGrant, ApiError> {
        let request = HttpRequest::post(self.url("login"))
            .with_json(&LoginRequest { auth_id, auth_pw })?;

        let response = self.transport.send(request).await?;
        let parsed: Option<LoginResponse> = response.json().ok();

        match parsed {
            Some(body) if response.is_success() && body.success => match body.token.clone() {
                Some(token) if !token.is_empty() => {
                    debug!(auth_id, "Login accepted");
                    Ok(LoginGrant {
                        profile: body.profile(auth_id),
                        token,
                    })
                }
                _ => Err(ApiError::InvalidResponse(
                    "Login response did not include a token".to_string(),
                )),
            },
            Some(LoginResponse {
                message: Some(message),
                ..
            }) => Err(ApiError::Service(message)),
            _ if !response.is_success() => Err(response.error()),
            _ => Err(ApiError::Service("Login failed".to_string())),
        }
    }

    /// Register a new account. Returns the service's confirmation message.
    pub async fn signup(&self, request: &SignupRequest) -> Result<String, ApiError> {
        let http = HttpRequest::post(self.url("signup")).with_json(request)?;
        let response = self.transport.send(http).await?;
        let parsed: Option<SignupResponse> = response.json().ok();

        match parsed {
            Some(body) if response.is_success() && body.success => Ok(body
                .message
                .unwrap_or_else(|| "Account created".to_string())),
            Some(SignupResponse {
                message: Some(message),
                ..
            }) => Err(ApiError::Service(message)),
            _ if !response.is_success() => Err(response.error()),
            _ => Err(ApiError::Service("Sign up failed".to_string())),
        }
    }

    /// Check a token with the Auth service. 401 comes back as `ApiError::Unauthorized`.
    pub async fn verify(&self, token: &str) -> Result<(), ApiError> {
        let request = HttpRequest::get(self.url("verify")).with_bearer(token);
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(response.error())
        }
    }

    /// Rotate a token. Returns the new access token.
    pub async fn refresh(&self, token: &str) -> Result<String, ApiError> {
        let request = HttpRequest::post(self.url("refresh")).with_bearer(token);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(response.error());
        }
        let body: RefreshResponse = response.json()?;
        if body.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Refresh response had an empty token".to_string(),
            ));
        }
        Ok(body.access_token)
    }
}
