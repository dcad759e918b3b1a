use crate::{
    auth::{
        repo_types::UserType,
        session::{Authentication, Session},
    },
    error::ApiError,
};

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    InsufficientRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access<'a> {
    Allow(&'a Session),
    Deny(DenyReason),
}

/// Decide whether `auth` may reach a resource guarded by `required`.
/// `None` means any signed-in user.
pub fn authorize(auth: &Authentication, required: Option<UserType>) -> Access<'_> {
    let Some(session) = auth.session() else {
        return Access::Deny(DenyReason::Unauthenticated);
    };
    match required {
        Some(role) if !session.user.user_type.satisfies(role) => {
            Access::Deny(DenyReason::InsufficientRole)
        }
        _ => Access::Allow(session),
    }
}

impl From<DenyReason> for ApiError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => ApiError::Unauthenticated,
            DenyReason::InsufficientRole => ApiError::InsufficientRole,
        }
    }
}

impl<'a> Access<'a> {
    pub fn into_result(self) -> Result<&'a Session, ApiError> {
        match self {
            Access::Allow(session) => Ok(session),
            Access::Deny(reason) => Err(reason.into()),
        }
    }
}
