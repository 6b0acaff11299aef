//! HTML pages
//!
//! Minimal inline markup. Every user-supplied value goes through [`escape`].

use axum::{
    Router, middleware,
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser, SESSION_COOKIE, removal_cookie, require_auth};
use crate::error::AppError;

/// Create page router
///
/// Routes:
/// - GET / - Welcome page
/// - GET /dashboard - Signed-in landing page
pub fn pages_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/dashboard", get(dashboard))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new().route("/", get(welcome)).merge(protected)
}

/// HTML-escape a value for element content or attribute values
pub(crate) fn escape(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

/// Wrap a page body in the shared document shell
pub(crate) fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Octolink</title>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
    ))
}

/// Error paragraph, or nothing
pub(crate) fn error_block(message: Option<&str>) -> String {
    match message {
        Some(message) => format!(r#"<p class="error" role="alert">{}</p>"#, escape(message)),
        None => String::new(),
    }
}

/// GET /
async fn welcome(MaybeUser(session): MaybeUser) -> impl IntoResponse {
    let actions = match session {
        Some(session) => format!(
            r#"<p>Signed in as {}.</p>
<a href="/dashboard">Go to dashboard</a>"#,
            escape(&session.name)
        ),
        None => r#"<a href="/login">Log in</a>
<a href="/register">Register</a>
<a href="/auth/github">Sign in with GitHub</a>"#
            .to_string(),
    };

    layout(
        "Welcome",
        &format!("<h1>Octolink</h1>\n<p>Sign in with a password or your GitHub account.</p>\n{actions}"),
    )
}

/// GET /dashboard
///
/// Reads the account fresh from the store; a session for a vanished
/// account is dropped.
async fn dashboard(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let account = match state.accounts.get_account(&session.account_id).await {
        Ok(account) => account,
        Err(AppError::NotFound) => {
            tracing::warn!(account_id = %session.account_id, "Session refers to a missing account");
            let jar = jar.remove(removal_cookie(SESSION_COOKIE));
            return Ok((jar, Redirect::to("/login")).into_response());
        }
        Err(error) => return Err(error),
    };

    let initial = account
        .name
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect::<String>())
        .unwrap_or_default();
    let badge = if account.is_linked() {
        r#"<span class="badge">GitHub Connected</span>"#
    } else {
        ""
    };

    let body = format!(
        r#"<div class="avatar">{initial}</div>
<h1>Welcome, {name}!</h1>
<p class="email">{email}</p>
{badge}
<form method="POST" action="/logout">
    <button type="submit">Logout</button>
</form>"#,
        initial = escape(&initial),
        name = escape(&account.name),
        email = escape(&account.email),
    );

    Ok(layout("Dashboard", &body).into_response())
}
