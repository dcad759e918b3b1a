use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Closed set of roles governing authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Searcher,
    Provider,
    Admin,
}

impl UserType {
    /// Role given to auto-registered OAuth users.
    pub const LEAST_PRIVILEGED: UserType = UserType::Searcher;

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Searcher => "searcher",
            UserType::Provider => "provider",
            UserType::Admin => "admin",
        }
    }

    /// Whether a holder of `self` may access a resource requiring `required`.
    pub fn satisfies(&self, required: UserType) -> bool {
        *self == UserType::Admin || *self == required
    }
}

impl std::str::FromStr for UserType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "searcher" => Ok(UserType::Searcher),
            "provider" => Ok(UserType::Provider),
            "admin" => Ok(UserType::Admin),
            other => anyhow::bail!("unknown user type: {other}"),
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw row of the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub hashed_password: Option<String>,
    pub user_type: String,
}

/// Canonical record of a person. Only the credentials provider reads
/// `hashed_password`; everything that leaves the auth boundary goes through
/// [`SafeUser`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>,
    pub user_type: UserType,
}

impl std::fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("user_type", &self.user_type)
            .field("has_password", &self.hashed_password.is_some())
            .finish_non_exhaustive()
    }
}

impl TryFrom<UserRow> for UserIdentity {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            name: r.name,
            first_name: r.first_name,
            last_name: r.last_name,
            username: r.username,
            hashed_password: r.hashed_password,
            user_type: r.user_type.parse()?,
        })
    }
}

/// `UserIdentity` without the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub user_type: UserType,
}

impl From<&UserIdentity> for SafeUser {
    fn from(u: &UserIdentity) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            name: u.name.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            username: u.username.clone(),
            user_type: u.user_type,
        }
    }
}

impl From<UserIdentity> for SafeUser {
    fn from(u: UserIdentity) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            first_name: u.first_name,
            last_name: u.last_name,
            username: u.username,
            user_type: u.user_type,
        }
    }
}

/// Fields for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub hashed_password: Option<String>,
    pub user_type: UserType,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> UserIdentity {
        UserIdentity {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            name: Some("Ada Lovelace".into()),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            username: Some("ada".into()),
            hashed_password: Some("$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into()),
            user_type: UserType::Provider,
        }
    }

    #[test]
    fn safe_user_never_serializes_password_hash() {
        let json = serde_json::to_value(SafeUser::from(&identity())).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("hashedPassword"));
        assert!(!obj.contains_key("hashed_password"));
        assert!(!json.to_string().contains("argon2"));
        assert_eq!(obj["firstName"], "Ada");
        assert_eq!(obj["userType"], "provider");
    }

    #[test]
    fn identity_serialization_and_debug_skip_hash() {
        let user = identity();
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hashedPassword"));
        assert!(!format!("{:?}", user).contains("argon2"));
    }

    #[test]
    fn owned_and_borrowed_projection_agree() {
        let user = identity();
        assert_eq!(SafeUser::from(&user), SafeUser::from(user.clone()));
    }

    #[test]
    fn admin_satisfies_every_role_others_only_their_own() {
        assert!(UserType::Admin.satisfies(UserType::Provider));
        assert!(UserType::Admin.satisfies(UserType::Searcher));
        assert!(UserType::Provider.satisfies(UserType::Provider));
        assert!(!UserType::Provider.satisfies(UserType::Admin));
        assert!(!UserType::Searcher.satisfies(UserType::Provider));
    }

    #[test]
    fn row_with_unknown_user_type_is_rejected() {
        let row = UserRow {
            id: Uuid::new_v4(),
            email: "x@example.com".into(),
            name: None,
            first_name: None,
            last_name: None,
            username: None,
            hashed_password: None,
            user_type: "superuser".into(),
        };
        assert!(UserIdentity::try_from(row).is_err());
    }
}
