//! Error taxonomy shared by every route.
//!
//! Each variant maps to one HTTP status and renders as
//! `{"error": "<message>", "code": "<code>"}`. Internal and provider failures
//! log their detail and return a generic message.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad email/password, or an OAuth profile that resolves to no account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No valid session on a protected action.
    #[error("Authentication required")]
    Unauthenticated,

    /// Valid session, but its user type does not satisfy the route.
    #[error("Insufficient role")]
    InsufficientRole,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// External OAuth provider failure. The detail is logged, never returned.
    #[error("Sign in failed")]
    ProviderError(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientRole => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ProviderError(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::InsufficientRole => "insufficient_role",
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::ProviderError(_) => "provider_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(e) => error!(error = %e, "internal error"),
            ApiError::ProviderError(detail) => error!(detail = %detail, "oauth provider error"),
            _ => {}
        }

        let body = Json(ErrorBody {
            error: self.to_string(),
            code: self.code(),
        });
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_stay_distinct_for_guarded_reads() {
        assert_eq!(ApiError::bad_request("missing id").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("no user").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InsufficientRole.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_and_provider_messages_are_generic() {
        let err = ApiError::Internal(anyhow::anyhow!("connection refused to db at secret-host"));
        assert_eq!(err.to_string(), "Internal server error");

        let err = ApiError::ProviderError("client_secret=abc rejected".into());
        assert_eq!(err.to_string(), "Sign in failed");
    }

    #[tokio::test]
    async fn renders_json_body_with_code() {
        let res = ApiError::bad_request("Missing id").into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "Missing id");
        assert_eq!(json["code"], "bad_request");
    }
}
