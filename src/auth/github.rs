//! GitHub OAuth client
//!
//! Authorization-code exchange and profile lookup. Produces a
//! [`NormalizedExternalProfile`] for the identity resolver; every failure
//! here is a provider error.

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::data::NormalizedExternalProfile;
use crate::error::AppError;

/// Token endpoint request body
#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
}

/// GitHub token response
///
/// GitHub answers 200 with an `error` field for bad or expired codes.
#[derive(Debug, Deserialize)]
struct GitHubTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GitHub user info
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

/// Entry of `GET /user/emails`
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Tokens obtained from the code exchange
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// OAuth client for a single GitHub app
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    authorize_url: String,
    token_url: String,
    api_base_url: String,
    scopes: String,
    redirect_uri: String,
}

impl GitHubClient {
    pub fn new(config: &AppConfig, http: reqwest::Client) -> Self {
        let github = &config.auth.github;
        Self {
            http,
            client_id: github.client_id.clone(),
            client_secret: github.client_secret.clone(),
            authorize_url: github.authorize_url.clone(),
            token_url: github.token_url.clone(),
            api_base_url: github.api_base_url.trim_end_matches('/').to_string(),
            scopes: github.scopes.clone(),
            redirect_uri: config.github_redirect_uri(),
        }
    }

    /// URL of the GitHub consent page for this app
    pub fn authorize_url(&self, state: &str) -> Result<String, AppError> {
        let url = url::Url::parse_with_params(
            &self.authorize_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scopes.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Config(format!("invalid auth.github.authorize_url: {e}")))?;

        Ok(url.into())
    }

    /// Exchange the callback code, then fetch the user's profile
    pub async fn authenticate(&self, code: &str) -> Result<NormalizedExternalProfile, AppError> {
        let grant = self.exchange_code(code).await?;
        self.fetch_profile(grant).await
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                code,
                redirect_uri: &self.redirect_uri,
            })
            .send()
            .await
            .map_err(provider_error("token request failed"))?
            .error_for_status()
            .map_err(provider_error("token endpoint returned an error status"))?;

        let token: GitHubTokenResponse = response
            .json()
            .await
            .map_err(provider_error("malformed token response"))?;

        if let Some(error) = token.error {
            return Err(AppError::Provider(format!(
                "token exchange rejected: {error} {}",
                token.error_description.unwrap_or_default()
            )));
        }

        let access_token = token
            .access_token
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Provider("token response without access_token".to_string()))?;

        Ok(TokenGrant {
            access_token,
            refresh_token: token.refresh_token.filter(|value| !value.is_empty()),
        })
    }

    /// Look up the authenticated user and normalize the result
    ///
    /// Falls back to the primary verified address from `/user/emails` when the
    /// profile has no public email. Failure of that second call only leaves
    /// the email absent.
    pub async fn fetch_profile(
        &self,
        grant: TokenGrant,
    ) -> Result<NormalizedExternalProfile, AppError> {
        let user: GitHubUser = self
            .api_get("/user", &grant.access_token)
            .await?
            .json()
            .await
            .map_err(provider_error("malformed user response"))?;

        let mut email = non_empty(user.email);
        if email.is_none() {
            email = match self.fetch_primary_email(&grant.access_token).await {
                Ok(email) => email,
                Err(error) => {
                    tracing::warn!(%error, github_id = user.id, "Could not fetch GitHub emails");
                    None
                }
            };
        }

        Ok(NormalizedExternalProfile {
            external_id: user.id.to_string(),
            email,
            display_name: non_empty(user.name),
            handle: non_empty(Some(user.login)),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
        })
    }

    async fn fetch_primary_email(&self, access_token: &str) -> Result<Option<String>, AppError> {
        let emails: Vec<GitHubEmail> = self
            .api_get("/user/emails", access_token)
            .await?
            .json()
            .await
            .map_err(provider_error("malformed emails response"))?;

        Ok(emails
            .into_iter()
            .find(|entry| entry.primary && entry.verified)
            .map(|entry| entry.email))
    }

    async fn api_get(&self, path: &str, access_token: &str) -> Result<reqwest::Response, AppError> {
        self.http
            .get(format!("{}{}", self.api_base_url, path))
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(provider_error("GitHub API request failed"))?
            .error_for_status()
            .map_err(provider_error("GitHub API returned an error status"))
    }
}

fn provider_error(context: &'static str) -> impl Fn(reqwest::Error) -> AppError {
    move |error| AppError::Provider(format!("{context}: {error}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
