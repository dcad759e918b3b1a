//! Session issuing and decoding.
//!
//! Sessions are stateless: everything lives in an HS256 JWT whose `user`
//! claim is the [`SafeUser`] projection. Nothing is stored server-side.

use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{
        claims::Claims,
        repo_types::{SafeUser, UserIdentity},
    },
    config::{JwtConfig, RefreshPolicy},
    state::AppState,
};

/// Session strategy. Only token-based sessions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStrategy {
    Jwt,
}

/// What callers see as "the session".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SafeUser,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

impl TryFrom<Claims> for Session {
    type Error = anyhow::Error;

    fn try_from(c: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user: c.user,
            expires: OffsetDateTime::from_unix_timestamp(c.exp as i64)?,
        })
    }
}

/// Result of authenticating a request. Bad tokens degrade to `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Authenticated(Session),
    Anonymous,
}

impl Authentication {
    pub fn session(&self) -> Option<&Session> {
        match self {
            Authentication::Authenticated(s) => Some(s),
            Authentication::Anonymous => None,
        }
    }
}

/// A freshly signed token together with the session it encodes.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub max_age: Duration,
    pub update_age: Duration,
    pub refresh: RefreshPolicy,
}

fn minutes(m: i64) -> Duration {
    Duration::from_secs((m.max(0) as u64).saturating_mul(60))
}

impl From<&JwtConfig> for SessionKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            max_age: minutes(cfg.max_age_minutes),
            update_age: minutes(cfg.update_age_minutes),
            refresh: cfg.refresh,
        }
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::from(&state.config.jwt)
    }
}

impl SessionKeys {
    pub fn strategy(&self) -> SessionStrategy {
        SessionStrategy::Jwt
    }

    fn sign_at(&self, user: SafeUser, now: OffsetDateTime) -> anyhow::Result<IssuedSession> {
        let exp = i64::try_from(self.max_age.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| anyhow::anyhow!("session max age out of range"))?;
        let claims = Claims {
            sub: user.id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            user,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %claims.sub, "session token signed");
        Ok(IssuedSession {
            token,
            session: Session::try_from(claims)?,
        })
    }

    /// Mint a session for a verified identity.
    pub fn issue(&self, user: &UserIdentity) -> anyhow::Result<IssuedSession> {
        self.sign_at(SafeUser::from(user), OffsetDateTime::now_utc())
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "session token verified");
        Ok(data.claims)
    }

    /// Decode an optional token into a session; never fails.
    pub fn authenticate(&self, token: Option<&str>) -> Authentication {
        let Some(token) = token else {
            return Authentication::Anonymous;
        };
        match self.verify(token).and_then(Session::try_from) {
            Ok(session) => Authentication::Authenticated(session),
            Err(e) => {
                debug!(error = %e, "session token rejected; treating request as anonymous");
                Authentication::Anonymous
            }
        }
    }

    /// Whether a valid token should be re-issued at `now`.
    pub fn needs_refresh(&self, claims: &Claims, now: OffsetDateTime) -> bool {
        match self.refresh {
            RefreshPolicy::Fixed => false,
            RefreshPolicy::Sliding => {
                let age = now.unix_timestamp() - claims.iat as i64;
                age >= self.update_age.as_secs() as i64
            }
        }
    }

    /// Re-issue `claims` with a fresh expiry when the policy calls for it.
    pub fn refresh_at(
        &self,
        claims: &Claims,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<IssuedSession>> {
        if !self.needs_refresh(claims, now) {
            return Ok(None);
        }
        self.sign_at(claims.user.clone(), now).map(Some)
    }
}
