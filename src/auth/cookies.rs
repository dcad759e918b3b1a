use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration as TimeDuration;

use crate::config::CookieConfig;

/// Short-lived cookie carrying the OAuth `state` parameter.
pub const OAUTH_STATE_COOKIE: &str = "oauth-state";

pub fn session_cookie(cfg: &CookieConfig, token: String, max_age: std::time::Duration) -> Cookie<'static> {
    Cookie::build((cfg.name.clone(), token))
        .path("/")
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(max_age.as_secs() as i64))
        .build()
}

pub fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_owned(), String::new()))
        .path("/")
        .build()
}

const OAUTH_STATE_PATH: &str = "/api/auth";

pub fn oauth_state_removal() -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, "")).path(OAUTH_STATE_PATH).build()
}

pub fn oauth_state_cookie(cfg: &CookieConfig, state: String) -> Cookie<'static> {
    Cookie::build((OAUTH_STATE_COOKIE, state))
        .path(OAUTH_STATE_PATH)
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(10))
        .build()
}
