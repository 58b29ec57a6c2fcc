use serde::{Deserialize, Serialize};

/// Profile cached alongside the token (`user_data` key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "companyId", alias = "company_id", skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

impl UserProfile {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub auth_id: &'a str,
    pub auth_pw: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub company_id: Option<String>,
    pub message: Option<String>,
}

impl LoginResponse {
    /// Build the profile to cache for a successful login.
    pub fn profile(&self, auth_id: &str) -> UserProfile {
        UserProfile {
            username: auth_id.to_string(),
            email: self.email.clone(),
            name: self.name.clone(),
            company_id: self.company_id.clone(),
        }
    }
}

/// A successful login: the bearer token and the profile to cache with it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginGrant {
    pub token: String,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub auth_id: String,
    pub auth_pw: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Company ids come back as numbers from some deployments and strings from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
