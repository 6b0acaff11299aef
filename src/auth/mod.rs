//! Authentication
//!
//! Handles:
//! - GitHub OAuth flow
//! - Email/password registration and login
//! - Session management
//! - Authentication middleware

pub mod github;
mod local;
mod middleware;
mod oauth;
pub mod password;
pub mod session;

use axum::Router;

use crate::AppState;

pub use github::GitHubClient;
pub use local::{GITHUB_FAILURE_MESSAGE, local_router};
pub use middleware::{CurrentUser, MaybeUser, require_auth, require_metrics_token};
pub use oauth::{OAUTH_STATE_COOKIE, auth_router};
pub use session::{
    SESSION_COOKIE, Session, create_session_token, issue_session, removal_cookie,
    session_cookie, verify_session_token,
};

/// All authentication routes
pub fn router() -> Router<AppState> {
    Router::new().merge(auth_router()).merge(local_router())
}
