use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::SafeUser;

/// JWT payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,      // user ID
    pub iat: usize,     // issued at (unix timestamp)
    pub exp: usize,     // expires at (unix timestamp)
    pub iss: String,    // issuer
    pub aud: String,    // audience
    pub user: SafeUser, // sanitized user projection
}
