use std::convert::Infallible;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{
    cookies::session_cookie,
    session::{Authentication, Session, SessionKeys},
};
use crate::{error::ApiError, state::AppState};

/// Session token from the session cookie, else from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name) {
        return Some(cookie.value().to_string());
    }
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
}

/// `Session | Anonymous`; never rejects.
pub struct MaybeSession(pub Authentication);

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers, &state.config.cookie.name);
        let keys = SessionKeys::from_ref(state);
        Ok(MaybeSession(keys.authenticate(token.as_deref())))
    }
}

/// Requires a valid session; rejects with 401 otherwise.
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeSession(auth) = MaybeSession::from_request_parts(parts, state)
            .await
            .unwrap_or(MaybeSession(Authentication::Anonymous));
        match auth {
            Authentication::Authenticated(session) => Ok(CurrentSession(session)),
            Authentication::Anonymous => {
                warn!(path = %parts.uri.path(), "unauthenticated request to protected route");
                Err(ApiError::Unauthenticated)
            }
        }
    }
}

fn sets_cookie(res: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Extends cookie sessions under the sliding policy. Runs after the handler
/// and leaves the response alone when the handler already set the cookie
/// (sign-in, sign-out).
pub async fn refresh_session(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    let cookie_cfg = &state.config.cookie;
    let keys = SessionKeys::from_ref(&state);

    let refreshed = jar
        .get(&cookie_cfg.name)
        .and_then(|c| keys.verify(c.value()).ok())
        .and_then(|claims| match keys.refresh_at(&claims, OffsetDateTime::now_utc()) {
            Ok(issued) => issued,
            Err(e) => {
                warn!(error = %e, "session refresh failed");
                None
            }
        });

    let res = next.run(req).await;

    match refreshed {
        Some(issued) if !sets_cookie(&res, &cookie_cfg.name) => {
            debug!(user_id = %issued.session.user.id, "sliding session extended");
            let jar = jar.add(session_cookie(cookie_cfg, issued.token, keys.max_age));
            (jar, res).into_response()
        }
        _ => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session-token=from-cookie"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers, "session-token").as_deref(), Some("from-cookie"));
    }

    #[test]
    fn bearer_used_without_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer abc.def.ghi"));
        assert_eq!(session_token(&headers, "session-token").as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(session_token(&headers, "session-token"), None);
        assert_eq!(session_token(&HeaderMap::new(), "session-token"), None);
    }
}
