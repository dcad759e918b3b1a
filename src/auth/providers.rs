//! Identity providers and the assembled auth options.
//!
//! Every provider turns some proof into a [`UserIdentity`] or fails. The
//! credentials provider never writes to the store; the OAuth providers may
//! create a user on first sign-in.

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        oauth::{OAuthProfile, OAuthProvider},
        password::{verify_dummy, verify_password},
        repo::{StoreError, UserStore},
        repo_types::{NewUser, UserIdentity, UserType},
        session::SessionStrategy,
    },
    config::{AppConfig, RefreshPolicy},
    error::ApiError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Credentials,
    Oauth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub signin_url: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    pub strategy: SessionStrategy,
    pub max_age_minutes: i64,
    pub update_age_minutes: i64,
    pub refresh: RefreshPolicy,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthOptions {
    pub providers: Vec<ProviderInfo>,
    pub session: SessionOptions,
}

/// Credentials first, then each OAuth provider that has client credentials.
pub fn auth_options(cfg: &AppConfig) -> AuthOptions {
    let base = &cfg.base_url;
    let mut providers = vec![ProviderInfo {
        id: "credentials",
        name: "Credentials",
        kind: ProviderKind::Credentials,
        signin_url: format!("{base}/api/auth/signin"),
        callback_url: format!("{base}/api/auth/callback/credentials"),
    }];
    providers.extend(
        OAuthProvider::ALL
            .into_iter()
            .filter(|p| p.client(&cfg.oauth).is_some())
            .map(|p| ProviderInfo {
                id: p.id(),
                name: p.name(),
                kind: ProviderKind::Oauth,
                signin_url: format!("{base}/api/auth/signin/{}", p.id()),
                callback_url: p.redirect_uri(base),
            }),
    );

    AuthOptions {
        providers,
        session: SessionOptions {
            strategy: SessionStrategy::Jwt,
            max_age_minutes: cfg.jwt.max_age_minutes,
            update_age_minutes: cfg.jwt.update_age_minutes,
            refresh: cfg.jwt.refresh,
        },
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check an email/password pair. Unknown email, OAuth-only account and
/// wrong password all come back as `InvalidCredentials`.
#[instrument(skip(store, password))]
pub async fn verify_credentials(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<UserIdentity, ApiError> {
    let email = normalize_email(email);
    let user = store
        .find_by_email(&email)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let Some(user) = user else {
        verify_dummy(password);
        warn!("credentials sign-in for unknown email");
        return Err(ApiError::InvalidCredentials);
    };

    let Some(hash) = user.hashed_password.as_deref() else {
        verify_dummy(password);
        warn!(user_id = %user.id, "credentials sign-in for account without password");
        return Err(ApiError::InvalidCredentials);
    };

    if !verify_password(password, hash)? {
        warn!(user_id = %user.id, "credentials sign-in with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    Ok(user)
}

/// Map an OAuth profile to a local user, creating one on first sign-in.
///
/// Two concurrent first sign-ins for one email race on the unique email
/// constraint: the first insert wins and the loser re-reads that row.
#[instrument(skip(store, profile), fields(provider = profile.provider.id()))]
pub async fn resolve_oauth_identity(
    store: &dyn UserStore,
    profile: &OAuthProfile,
) -> Result<UserIdentity, ApiError> {
    let Some(email) = profile.email.as_deref().map(normalize_email) else {
        warn!(account = %profile.provider_account_id, "oauth profile has no usable email");
        return Err(ApiError::InvalidCredentials);
    };

    let existing = store
        .find_by_email(&email)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    let user = match existing {
        Some(user) => user,
        None => {
            let new_user = NewUser {
                email: email.clone(),
                name: profile.name.clone(),
                first_name: None,
                last_name: None,
                username: None,
                hashed_password: None,
                user_type: UserType::LEAST_PRIVILEGED,
            };
            match store.create(new_user).await {
                Ok(user) => {
                    info!(user_id = %user.id, "user auto-registered via oauth");
                    user
                }
                Err(StoreError::EmailTaken) => {
                    info!("lost oauth registration race; using existing user");
                    store
                        .find_by_email(&email)
                        .await
                        .map_err(|e| ApiError::Internal(e.into()))?
                        .ok_or_else(|| {
                            ApiError::Internal(anyhow::anyhow!(
                                "email reported taken but no user found"
                            ))
                        })?
                }
                Err(e) => return Err(ApiError::Internal(e.into())),
            }
        }
    };

    store
        .link_account(user.id, profile.provider.id(), &profile.provider_account_id)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(user)
}
