//! Protected landing page used as the default post-sign-in target.

use axum::{
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use tracing::debug;

use crate::{
    auth::{
        extractors::MaybeSession,
        guard::{authorize, Access},
    },
    state::AppState,
};

const SIGN_IN_REDIRECT: &str = "/signin?callbackUrl=/dashboard";

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

pub async fn dashboard(MaybeSession(auth): MaybeSession) -> Response {
    match authorize(&auth, None) {
        Access::Allow(session) => Html(format!(
            "<!doctype html><html><body><h1>Dashboard</h1><p>Signed in as {} ({})</p></body></html>",
            session.user.id,
            session.user.user_type,
        ))
        .into_response(),
        Access::Deny(reason) => {
            debug!(?reason, "dashboard requires sign-in");
            Redirect::to(SIGN_IN_REDIRECT).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };

    use super::*;
    use crate::{
        app::build_app,
        auth::{repo_types::UserType, session::SessionKeys},
        test_support::{send, test_config, FakeOAuth, MemoryUserStore},
    };

    #[tokio::test]
    async fn anonymous_visitors_are_sent_to_sign_in() {
        let app = build_app(AppState::fake());
        let res = send(&app, Request::builder().uri("/dashboard").body(Body::empty()).unwrap()).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], SIGN_IN_REDIRECT);
    }

    #[tokio::test]
    async fn signed_in_users_see_the_page() {
        let store = Arc::new(MemoryUserStore::default());
        let user = store.insert("dash@example.com", None, UserType::Provider).await;
        let token = SessionKeys::from(&test_config().jwt).issue(&user).unwrap().token;
        let app = build_app(AppState::from_parts(
            Arc::new(test_config()),
            store,
            Arc::new(FakeOAuth::failing()),
            None,
        ));

        let req = Request::builder()
            .uri("/dashboard")
            .header(header::COOKIE, format!("session-token={token}"))
            .body(Body::empty())
            .unwrap();
        let res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains(&user.id.to_string()));
        assert!(!html.contains("dash@example.com"));
    }
}
