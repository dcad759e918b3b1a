//! Edge filter: sees every request before routing.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::trace;

const AUTH_PREFIX: &str = "/api/auth";

#[derive(Debug)]
pub enum FilterOutcome {
    Continue,
    /// Gating hook for auth routes; no production policy builds it yet.
    #[cfg_attr(not(test), allow(dead_code))]
    ShortCircuit(Response),
}

fn is_auth_path(path: &str) -> bool {
    path == AUTH_PREFIX || path.starts_with("/api/auth/")
}

/// Current policy: every request continues.
pub fn filter(req: &Request) -> FilterOutcome {
    let path = req.uri().path();
    if is_auth_path(path) {
        // Auth routes pass straight through; gating for them belongs here.
        trace!(path, "auth route");
        return FilterOutcome::Continue;
    }
    FilterOutcome::Continue
}

pub async fn edge_filter(req: Request, next: Next) -> Response {
    let outcome = filter(&req);
    apply(outcome, req, next).await
}

async fn apply(outcome: FilterOutcome, req: Request, next: Next) -> Response {
    match outcome {
        FilterOutcome::Continue => next.run(req).await,
        FilterOutcome::ShortCircuit(res) => {
            trace!(path = %req.uri().path(), "request answered at the edge");
            res
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };

    use crate::test_support::send;

    fn request(path: &str) -> Request {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[test]
    fn every_path_continues() {
        for path in [
            "/",
            "/dashboard",
            "/api/auth",
            "/api/auth/session",
            "/api/auth/callback/github?code=x",
            "/api/authx",
            "/api/profile/check?id=1",
            "/static/logo.png",
        ] {
            assert!(
                matches!(filter(&request(path)), FilterOutcome::Continue),
                "{path} should continue"
            );
        }
    }

    #[test]
    fn auth_prefix_detection() {
        assert!(is_auth_path("/api/auth"));
        assert!(is_auth_path("/api/auth/signin"));
        assert!(!is_auth_path("/api/authx"));
        assert!(!is_auth_path("/api/profile/check"));
    }

    #[tokio::test]
    async fn short_circuit_skips_the_route() {
        let app = Router::new()
            .route("/api/auth/session", get(|| async { "reached" }))
            .layer(middleware::from_fn(|req: Request, next: Next| async move {
                let outcome = FilterOutcome::ShortCircuit(StatusCode::FORBIDDEN.into_response());
                apply(outcome, req, next).await
            }));

        let res = send(&app, request("/api/auth/session")).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn continue_reaches_the_route() {
        let app = Router::new()
            .route("/api/auth/session", get(|| async { "reached" }))
            .layer(middleware::from_fn(edge_filter));

        let res = send(&app, request("/api/auth/session")).await;
        assert_eq!(res.status(), StatusCode::OK);
    }
}
