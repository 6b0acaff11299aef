//! Authentication middleware
//!
//! Protects routes that require authentication.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use sha2::{Digest, Sha256};

use super::session::{SESSION_COOKIE, Session, verify_session_token};
use crate::AppState;
use crate::error::AppError;

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
}

fn authenticate_token(token: &str, state: &AppState) -> Result<Session, AppError> {
    verify_session_token(token, &state.config.auth.session_secret)
}

fn session_from_headers(headers: &HeaderMap, state: &AppState) -> Option<Session> {
    let token = extract_token_from_headers(headers)?;
    authenticate_token(&token, state).ok()
}

/// Middleware for page routes that require a signed-in user
///
/// Redirects to `/login` instead of answering 401, and adds the
/// Session to request extensions if valid.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/dashboard", ...)
///     .layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(session) = session_from_headers(request.headers(), &state) else {
        return Redirect::to("/login").into_response();
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

fn token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// Middleware for the metrics scrape endpoint
///
/// Requires `Authorization: Bearer <metrics.token>`. Answers 401 otherwise.
pub async fn require_metrics_token(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let authorized = match (
        extract_bearer_token(request.headers()),
        state.config.metrics.token(),
    ) {
        (Some(presented), Some(expected)) => token_matches(presented, expected),
        _ => false,
    };

    if !authorized {
        tracing::debug!("Rejected metrics scrape without a valid token");
        return AppError::Unauthorized.into_response();
    }

    next.run(request).await
}

/// Extractor for current authenticated user
///
/// Use in handlers to get the current session.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentUser(session));
        }

        let state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        let session = authenticate_token(&token, &state)?;
        parts.extensions.insert(session.clone());

        Ok(CurrentUser(session))
    }
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(MaybeUser(Some(session)));
        }

        let app_state = AppState::from_ref(state);
        let session = session_from_headers(&parts.headers, &app_state);

        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(MaybeUser(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_read_from_authorization_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer scrape-secret"));
        assert_eq!(extract_bearer_token(&headers), Some("scrape-secret"));
    }

    #[test]
    fn metrics_token_must_match_exactly() {
        assert!(token_matches("scrape-secret", "scrape-secret"));
        assert!(!token_matches("scrape-secre", "scrape-secret"));
        assert!(!token_matches("", "scrape-secret"));
    }
}
