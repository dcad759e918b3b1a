//! OAuth authorization-code flow for GitHub and Google.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    config::{OAuthClientConfig, OAuthConfig},
    error::ApiError,
};

const USER_AGENT: &str = "sessiongate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Github,
    Google,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 2] = [OAuthProvider::Github, OAuthProvider::Google];

    pub fn id(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "github",
            OAuthProvider::Google => "google",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "GitHub",
            OAuthProvider::Google => "Google",
        }
    }

    fn authorize_endpoint(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "https://github.com/login/oauth/authorize",
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "read:user user:email",
            OAuthProvider::Google => "openid email profile",
        }
    }

    pub fn client<'a>(&self, cfg: &'a OAuthConfig) -> Option<&'a OAuthClientConfig> {
        match self {
            OAuthProvider::Github => cfg.github.as_ref(),
            OAuthProvider::Google => cfg.google.as_ref(),
        }
    }

    pub fn redirect_uri(&self, base_url: &str) -> String {
        format!("{}/api/auth/callback/{}", base_url, self.id())
    }

    /// URL the browser is sent to in order to start the flow.
    pub fn authorization_url(
        &self,
        client: &OAuthClientConfig,
        redirect_uri: &str,
        state: &str,
    ) -> anyhow::Result<String> {
        let url = Url::parse_with_params(
            self.authorize_endpoint(),
            &[
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", self.scope()),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }
}

impl std::str::FromStr for OAuthProvider {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(OAuthProvider::Github),
            "google" => Ok(OAuthProvider::Google),
            other => Err(ApiError::not_found(format!("Unknown provider: {other}"))),
        }
    }
}

/// Identity asserted by a provider after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub provider: OAuthProvider,
    pub provider_account_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Turns an authorization code into a provider profile.
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    async fn exchange(
        &self,
        provider: OAuthProvider,
        client: &OAuthClientConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthProfile, ApiError>;
}

#[derive(Clone, Default)]
pub struct HttpOAuthExchange {
    http: reqwest::Client,
}

impl HttpOAuthExchange {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn provider_err(what: &str) -> impl Fn(reqwest::Error) -> ApiError + '_ {
    move |e| ApiError::ProviderError(format!("{what}: {e}"))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

impl TokenResponse {
    fn into_token(self, provider: OAuthProvider) -> Result<String, ApiError> {
        match (self.access_token, self.error) {
            (Some(token), _) => Ok(token),
            (None, err) => Err(ApiError::ProviderError(format!(
                "{} token exchange returned no access token ({})",
                provider.id(),
                err.unwrap_or_else(|| "no error given".into())
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

impl HttpOAuthExchange {
    async fn github(
        &self,
        client: &OAuthClientConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthProfile, ApiError> {
        let token = self
            .http
            .post("https://github.com/login/oauth/access_token")
            .header("Accept", "application/json")
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(provider_err("github token exchange"))?
            .json::<TokenResponse>()
            .await
            .map_err(provider_err("github token response"))?
            .into_token(OAuthProvider::Github)?;

        let user: GitHubUser = self
            .http
            .get("https://api.github.com/user")
            .bearer_auth(&token)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(provider_err("github user"))?
            .json()
            .await
            .map_err(provider_err("github user response"))?;

        let email = match user.email {
            Some(email) => Some(email),
            None => {
                let emails: Vec<GitHubEmail> = self
                    .http
                    .get("https://api.github.com/user/emails")
                    .bearer_auth(&token)
                    .header("User-Agent", USER_AGENT)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(provider_err("github emails"))?
                    .json()
                    .await
                    .map_err(provider_err("github emails response"))?;
                primary_verified_email(emails)
            }
        };

        Ok(OAuthProfile {
            provider: OAuthProvider::Github,
            provider_account_id: user.id.to_string(),
            email,
            name: user.name.or(Some(user.login)),
        })
    }

    async fn google(
        &self,
        client: &OAuthClientConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthProfile, ApiError> {
        let token = self
            .http
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", client.client_id.as_str()),
                ("client_secret", client.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(provider_err("google token exchange"))?
            .json::<TokenResponse>()
            .await
            .map_err(provider_err("google token response"))?
            .into_token(OAuthProvider::Google)?;

        let user: GoogleUser = self
            .http
            .get("https://openidconnect.googleapis.com/v1/userinfo")
            .bearer_auth(&token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(provider_err("google userinfo"))?
            .json()
            .await
            .map_err(provider_err("google userinfo response"))?;

        Ok(OAuthProfile {
            provider: OAuthProvider::Google,
            provider_account_id: user.sub,
            email: user.email.filter(|_| user.email_verified),
            name: user.name,
        })
    }
}

fn primary_verified_email(emails: Vec<GitHubEmail>) -> Option<String> {
    emails
        .into_iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email)
}

#[async_trait]
impl OAuthExchange for HttpOAuthExchange {
    #[instrument(skip(self, client, code))]
    async fn exchange(
        &self,
        provider: OAuthProvider,
        client: &OAuthClientConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthProfile, ApiError> {
        let profile = match provider {
            OAuthProvider::Github => self.github(client, code, redirect_uri).await?,
            OAuthProvider::Google => self.google(client, code, redirect_uri).await?,
        };
        debug!(provider = provider.id(), account = %profile.provider_account_id, "oauth profile fetched");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client-123".into(),
            client_secret: "shh-secret".into(),
        }
    }

    #[test]
    fn authorization_url_carries_client_id_and_state_but_not_secret() {
        let redirect = OAuthProvider::Github.redirect_uri("http://localhost:8080");
        assert_eq!(redirect, "http://localhost:8080/api/auth/callback/github");

        let url = OAuthProvider::Github
            .authorization_url(&client(), &redirect, "state-xyz")
            .unwrap();
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=state-xyz"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fapi%2Fauth%2Fcallback%2Fgithub"));
        assert!(!url.contains("shh-secret"));
    }

    #[test]
    fn google_url_uses_openid_scope() {
        let url = OAuthProvider::Google
            .authorization_url(&client(), "http://x/cb", "s")
            .unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("scope=openid+email+profile"));
    }

    #[test]
    fn provider_ids_parse() {
        assert_eq!("github".parse::<OAuthProvider>().unwrap(), OAuthProvider::Github);
        assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert!("gitlab".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn picks_primary_verified_github_email() {
        let emails = vec![
            GitHubEmail { email: "old@example.com".into(), primary: false, verified: true },
            GitHubEmail { email: "unverified@example.com".into(), primary: true, verified: false },
        ];
        assert_eq!(primary_verified_email(emails), None);

        let emails = vec![
            GitHubEmail { email: "old@example.com".into(), primary: false, verified: true },
            GitHubEmail { email: "main@example.com".into(), primary: true, verified: true },
        ];
        assert_eq!(primary_verified_email(emails).as_deref(), Some("main@example.com"));
    }

    #[test]
    fn token_response_without_token_is_provider_error() {
        let resp = TokenResponse {
            access_token: None,
            error: Some("bad_verification_code".into()),
        };
        let err = resp.into_token(OAuthProvider::Github).unwrap_err();
        assert!(matches!(err, ApiError::ProviderError(_)));
        assert_eq!(err.to_string(), "Sign in failed");
    }
}
