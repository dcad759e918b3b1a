use std::collections::BTreeMap;

use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{CookieJar, WithRejection};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        cookies::{
            oauth_state_cookie, oauth_state_removal, removal_cookie, session_cookie,
            OAUTH_STATE_COOKIE,
        },
        dto::{
            AuthResponse, CallbackQuery, DebugResponse, LoginRequest, RegisterRequest,
            SessionResponse, SignInQuery,
        },
        extractors::MaybeSession,
        oauth::OAuthProvider,
        password::hash_password,
        providers::{
            auth_options, normalize_email, resolve_oauth_identity, verify_credentials,
            AuthOptions, ProviderInfo,
        },
        repo::StoreError,
        repo_types::{NewUser, UserIdentity, UserType},
        session::{Authentication, SessionKeys},
    },
    error::ApiError,
    state::AppState,
};

const DEFAULT_CALLBACK: &str = "/dashboard";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/callback/credentials", post(credentials_sign_in))
        .route("/api/auth/signin", get(sign_in_options))
        .route("/api/auth/signin/:provider", get(oauth_sign_in))
        .route("/api/auth/callback/:provider", get(oauth_callback))
        .route("/api/auth/signout", post(sign_out))
        .route("/api/auth/session", get(get_session))
        .route("/api/auth/providers", get(list_providers))
        .route("/api/auth/debug", get(debug_env))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A path browsers resolve on this origin. `//host` and `/\host` are
/// treated as network paths, so both are refused.
fn is_local_path(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/' | '\\'))
        && !path.chars().any(|c| c.is_control())
}

/// Only same-site paths are accepted as post-sign-in targets.
fn safe_callback(base_url: &str, candidate: Option<&str>) -> String {
    let path = match candidate {
        Some(c) if c.starts_with('/') => c,
        Some(c) => c.strip_prefix(base_url).unwrap_or_default(),
        None => "",
    };
    if is_local_path(path) {
        path.to_string()
    } else {
        DEFAULT_CALLBACK.to_string()
    }
}

fn sign_in_error(code: &str) -> Redirect {
    Redirect::to(&format!("/signin?error={code}"))
}

fn signed_in(
    state: &AppState,
    jar: CookieJar,
    user: &UserIdentity,
) -> Result<(CookieJar, AuthResponse), ApiError> {
    let keys = SessionKeys::from_ref(state);
    let issued = keys.issue(user)?;
    let jar = jar.add(session_cookie(
        &state.config.cookie,
        issued.token.clone(),
        keys.max_age,
    ));
    Ok((
        jar,
        AuthResponse {
            token: issued.token,
            session: issued.session,
        },
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(mut payload), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::bad_request("Password too short"));
    }

    let user_type = payload.user_type.unwrap_or(UserType::LEAST_PRIVILEGED);
    if user_type == UserType::Admin {
        warn!(email = %payload.email, "self-registration as admin refused");
        return Err(ApiError::bad_request("Invalid user type"));
    }

    let hash = hash_password(&payload.password)?;

    let display_name = match (&payload.first_name, &payload.last_name) {
        (Some(f), Some(l)) => Some(format!("{f} {l}")),
        (Some(f), None) => Some(f.clone()),
        (None, Some(l)) => Some(l.clone()),
        (None, None) => None,
    };

    let user = match state
        .users
        .create(NewUser {
            email: payload.email.clone(),
            name: display_name,
            first_name: payload.first_name,
            last_name: payload.last_name,
            username: payload.username,
            hashed_password: Some(hash),
            user_type,
        })
        .await
    {
        Ok(u) => u,
        Err(StoreError::EmailTaken) => {
            warn!(email = %payload.email, "email already registered");
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(ApiError::Internal(e.into()));
        }
    };

    let (jar, body) = signed_in(&state, jar, &user)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, jar, Json(body)))
}

#[instrument(skip(state, jar, payload))]
pub async fn credentials_sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    // Malformed emails fail like unknown ones.
    let user = verify_credentials(state.users.as_ref(), &payload.email, &payload.password).await?;

    let (jar, body) = signed_in(&state, jar, &user)?;
    info!(user_id = %user.id, "user signed in with credentials");
    Ok((jar, Json(body)))
}

pub async fn sign_in_options(State(state): State<AppState>) -> Json<AuthOptions> {
    Json(auth_options(&state.config))
}

#[instrument(skip(state, jar))]
pub async fn oauth_sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(provider): Path<String>,
    WithRejection(Query(q), _): WithRejection<Query<SignInQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let provider: OAuthProvider = provider.parse()?;
    let client = provider
        .client(&state.config.oauth)
        .ok_or_else(|| ApiError::not_found(format!("{} sign-in is not configured", provider.name())))?;

    let csrf = Uuid::new_v4().to_string();
    let callback = safe_callback(&state.config.base_url, q.callback_url.as_deref());
    let redirect_uri = provider.redirect_uri(&state.config.base_url);
    let url = provider.authorization_url(client, &redirect_uri, &csrf)?;

    let jar = jar.add(oauth_state_cookie(
        &state.config.cookie,
        format!("{csrf}|{callback}"),
    ));
    info!(provider = provider.id(), "redirecting to oauth provider");
    Ok((jar, Redirect::to(&url)))
}

#[instrument(skip(state, jar, q))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(provider): Path<String>,
    WithRejection(Query(q), _): WithRejection<Query<CallbackQuery>, ApiError>,
) -> Response {
    let provider: OAuthProvider = match provider.parse() {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    let stored = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();
    let jar = jar.remove(oauth_state_removal());
    let (expected_state, callback) = stored
        .split_once('|')
        .map(|(s, c)| (s.to_string(), c.to_string()))
        .unwrap_or_default();

    if let Some(err) = q.error.as_deref() {
        warn!(provider = provider.id(), error = err, "provider returned an error");
        return (jar, sign_in_error("OAuthCallback")).into_response();
    }

    let (Some(code), Some(returned_state)) = (q.code.as_deref(), q.state.as_deref()) else {
        warn!(provider = provider.id(), "callback without code or state");
        return (jar, sign_in_error("OAuthCallback")).into_response();
    };

    if expected_state.is_empty() || expected_state != returned_state {
        warn!(provider = provider.id(), "oauth state mismatch");
        return (jar, sign_in_error("OAuthCallback")).into_response();
    }

    let Some(client) = provider.client(&state.config.oauth) else {
        return (jar, sign_in_error("OAuthSignin")).into_response();
    };

    let redirect_uri = provider.redirect_uri(&state.config.base_url);
    let profile = match state
        .oauth
        .exchange(provider, client, code, &redirect_uri)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            warn!(provider = provider.id(), error = ?e, "oauth exchange failed");
            return (jar, sign_in_error("OAuthCallback")).into_response();
        }
    };

    let user = match resolve_oauth_identity(state.users.as_ref(), &profile).await {
        Ok(u) => u,
        Err(ApiError::InvalidCredentials) => {
            return (jar, sign_in_error("AccessDenied")).into_response();
        }
        Err(e) => {
            error!(provider = provider.id(), error = %e, "oauth user resolution failed");
            return (jar, sign_in_error("Callback")).into_response();
        }
    };

    match signed_in(&state, jar.clone(), &user) {
        Ok((jar, _)) => {
            info!(user_id = %user.id, provider = provider.id(), "user signed in with oauth");
            let target = safe_callback(&state.config.base_url, Some(&callback));
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => {
            error!(provider = provider.id(), error = %e, "signing oauth session failed");
            (jar, sign_in_error("Callback")).into_response()
        }
    }
}

pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(removal_cookie(&state.config.cookie.name));
    (jar, StatusCode::NO_CONTENT)
}

pub async fn get_session(MaybeSession(auth): MaybeSession) -> Json<SessionResponse> {
    Json(match auth {
        Authentication::Authenticated(session) => SessionResponse::Authenticated(session),
        Authentication::Anonymous => SessionResponse::Anonymous {},
    })
}

pub async fn list_providers(State(state): State<AppState>) -> Json<BTreeMap<&'static str, ProviderInfo>> {
    Json(
        auth_options(&state.config)
            .providers
            .into_iter()
            .map(|p| (p.id, p))
            .collect(),
    )
}

pub async fn debug_env(State(state): State<AppState>) -> Json<DebugResponse> {
    Json(DebugResponse {
        env: state.config.oauth.env_presence.clone(),
    })
}
