//! GitHub OAuth flow
//!
//! Implements the OAuth 2.0 authorization code flow with GitHub and hands
//! the resulting profile to the identity resolver. The callback is the
//! boundary where every failure becomes the same login-page message.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;

use super::password::random_token;
use super::session::{issue_session, removal_cookie, session_cookie};
use crate::AppState;
use crate::data::Account;
use crate::error::AppError;
use crate::metrics::observe_login;

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const OAUTH_STATE_LEN: usize = 40;
const OAUTH_STATE_MAX_AGE_SECONDS: i64 = 600;

/// Create GitHub authentication router
///
/// Routes:
/// - GET /auth/github - Redirect to GitHub
/// - GET /auth/github/callback - OAuth callback
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/github", get(github_redirect))
        .route("/auth/github/callback", get(github_callback))
}

// =============================================================================
// GitHub OAuth
// =============================================================================

/// GET /auth/github
///
/// Redirects user to GitHub authorization page.
///
/// # Steps
/// 1. Generate CSRF state token
/// 2. Store state in cookie
/// 3. Redirect to GitHub with client_id, redirect_uri, scope, state
async fn github_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let csrf_state = generate_csrf_state();
    let authorize_url = state.github.authorize_url(&csrf_state)?;

    let cookie = Cookie::build((OAUTH_STATE_COOKIE, csrf_state))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.should_use_secure_cookies())
        .max_age(time::Duration::seconds(OAUTH_STATE_MAX_AGE_SECONDS))
        .build();

    Ok((jar.add(cookie), Redirect::to(&authorize_url)))
}

/// Query parameters from GitHub callback
///
/// GitHub sends `code` and `state` on success, `error` and `state` when
/// the user declines.
#[derive(Debug, Deserialize)]
struct GitHubCallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// e.g. "access_denied"
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /auth/github/callback
///
/// Handles OAuth callback from GitHub.
///
/// # Steps
/// 1. Verify CSRF state
/// 2. Exchange code for access token
/// 3. Fetch user info from GitHub
/// 4. Resolve the GitHub identity to a local account
/// 5. Create session and set cookie
/// 6. Redirect to dashboard
///
/// A bad CSRF state answers 401. Any later failure redirects to
/// `/login?error=github`.
async fn github_callback(
    State(state): State<AppState>,
    Query(query): Query<GitHubCallbackQuery>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    verify_csrf_state(query.state.as_deref(), &jar)?;
    let jar = jar.remove(removal_cookie(OAUTH_STATE_COOKIE));

    match complete_login(&state, query).await {
        Ok((account, token)) => {
            observe_login("github", "success");
            tracing::info!(account_id = %account.id, "GitHub login succeeded");
            let jar = jar.add(session_cookie(token, &state.config));
            Ok((jar, Redirect::to("/dashboard")).into_response())
        }
        Err(error) => {
            observe_login("github", "failure");
            log_login_failure(&error);
            Ok((jar, Redirect::to("/login?error=github")).into_response())
        }
    }
}

async fn complete_login(
    state: &AppState,
    query: GitHubCallbackQuery,
) -> Result<(Account, String), AppError> {
    if let Some(error) = query.error {
        if error == "access_denied" {
            return Err(AppError::ProviderDenied);
        }
        return Err(AppError::Provider(format!(
            "authorization failed: {error} {}",
            query.error_description.unwrap_or_default()
        )));
    }

    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::Provider("callback without authorization code".to_string()))?;

    let profile = state.github.authenticate(&code).await?;
    let account = state.identity.resolve(&profile).await?;
    let token = issue_session(&account, &state.config)?;

    Ok((account, token))
}

/// Log a failed GitHub login by kind
///
/// Invalid profiles point at an adapter bug and are reported separately
/// from provider trouble and store conflicts.
fn log_login_failure(error: &AppError) {
    match error {
        AppError::InvalidProfile(detail) => tracing::error!(
            kind = error.kind(),
            %detail,
            "GitHub returned a profile that cannot be resolved; check the OAuth adapter"
        ),
        AppError::Provider(_) | AppError::ProviderDenied | AppError::HttpClient(_) => {
            tracing::warn!(kind = error.kind(), %error, "GitHub authorization failed")
        }
        AppError::Conflict(_) => {
            tracing::error!(kind = error.kind(), %error, "GitHub login could not be resolved")
        }
        AppError::LinkRefused(_) => {
            tracing::warn!(kind = error.kind(), %error, "GitHub login refused to link an existing account")
        }
        _ => tracing::error!(kind = error.kind(), %error, "GitHub login failed"),
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a random CSRF state token
fn generate_csrf_state() -> String {
    random_token(OAUTH_STATE_LEN)
}

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(state: Option<&str>, jar: &CookieJar) -> Result<(), AppError> {
    let expected = jar
        .get(OAUTH_STATE_COOKIE)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .ok_or(AppError::Unauthorized)?;

    match state {
        Some(state) if state == expected => Ok(()),
        _ => {
            tracing::warn!("GitHub callback state does not match the issued state");
            Err(AppError::Unauthorized)
        }
    }
}
