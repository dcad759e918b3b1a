use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::auth::{repo_types::UserType, session::Session};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub user_type: Option<UserType>,
}

/// Request body for credential sign-in.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned after register or credential sign-in. The token is also set as
/// the session cookie.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub session: Session,
}

/// `GET /api/auth/session`: the session, or `{}` when anonymous.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SessionResponse {
    Authenticated(Session),
    Anonymous {},
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInQuery {
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Whether each provider setting is present. Never carries values.
#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub env: BTreeMap<&'static str, bool>,
}
