use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PROVIDER_ENV_KEYS: [&str; 4] =
    ["GITHUB_ID", "GITHUB_SECRET", "GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"];

/// How a still-valid session token is treated on later requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Expiry is fixed at sign-in.
    Fixed,
    /// Tokens older than `update_age_minutes` are re-issued with a fresh expiry.
    Sliding,
}

impl std::str::FromStr for RefreshPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "sliding" => Ok(Self::Sliding),
            other => anyhow::bail!("unknown session refresh policy: {other}"),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub max_age_minutes: i64,
    pub update_age_minutes: i64,
    pub refresh: RefreshPolicy,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("max_age_minutes", &self.max_age_minutes)
            .field("update_age_minutes", &self.update_age_minutes)
            .field("refresh", &self.refresh)
            .finish()
    }
}

/// Longest session accepted from configuration: ten years.
pub const MAX_SESSION_MINUTES: i64 = 60 * 24 * 365 * 10;

impl JwtConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=MAX_SESSION_MINUTES).contains(&self.max_age_minutes) {
            anyhow::bail!(
                "SESSION_MAX_AGE_MINUTES must be between 1 and {MAX_SESSION_MINUTES}, got {}",
                self.max_age_minutes
            );
        }
        if !(0..=self.max_age_minutes).contains(&self.update_age_minutes) {
            anyhow::bail!(
                "SESSION_UPDATE_AGE_MINUTES must be between 0 and the max age ({}), got {}",
                self.max_age_minutes,
                self.update_age_minutes
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
}

/// Client credentials for one OAuth identity provider.
#[derive(Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthConfig {
    pub github: Option<OAuthClientConfig>,
    pub google: Option<OAuthClientConfig>,
    /// Which provider variables were set at startup.
    #[serde(skip)]
    pub env_presence: BTreeMap<&'static str, bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub base_url: String,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub oauth: OAuthConfig,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn oauth_client(id_key: &str, secret_key: &str) -> Option<OAuthClientConfig> {
    match (env_nonempty(id_key), env_nonempty(secret_key)) {
        (Some(client_id), Some(client_secret)) => Some(OAuthClientConfig {
            client_id,
            client_secret,
        }),
        _ => None,
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let secret = env_nonempty("JWT_SECRET")
            .or_else(|| env_nonempty("NEXTAUTH_SECRET"))
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET (or NEXTAUTH_SECRET) must be set"))?;
        let base_url = env_nonempty("APP_BASE_URL")
            .or_else(|| env_nonempty("NEXTAUTH_URL"))
            .unwrap_or_else(|| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "sessiongate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "sessiongate-users".into()),
            max_age_minutes: std::env::var("SESSION_MAX_AGE_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
            update_age_minutes: std::env::var("SESSION_UPDATE_AGE_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24),
            refresh: match env_nonempty("SESSION_REFRESH") {
                Some(v) => v.parse()?,
                None => RefreshPolicy::Sliding,
            },
        };

        jwt.validate()?;

        let cookie = CookieConfig {
            name: std::env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "session-token".into()),
            secure: std::env::var("SESSION_COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or_else(|_| base_url.starts_with("https://")),
        };

        let oauth = OAuthConfig {
            github: oauth_client("GITHUB_ID", "GITHUB_SECRET"),
            google: oauth_client("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            env_presence: PROVIDER_ENV_KEYS
                .into_iter()
                .map(|k| (k, env_nonempty(k).is_some()))
                .collect(),
        };

        Ok(Self {
            database_url,
            base_url,
            jwt,
            cookie,
            oauth,
        })
    }
}
