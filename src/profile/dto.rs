use serde::{Deserialize, Serialize};

use crate::auth::repo_types::UserIdentity;

#[derive(Debug, Deserialize)]
pub struct ProfileCheckQuery {
    pub id: Option<String>,
}

/// The only fields `/api/profile/check` ever exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<UserIdentity> for ProfileSummary {
    fn from(u: UserIdentity) -> Self {
        Self {
            first_name: u.first_name,
            last_name: u.last_name,
            username: u.username,
        }
    }
}
