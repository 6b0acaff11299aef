//! Email and password authentication
//!
//! Registration, login and logout forms.

use axum::{
    Form, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::middleware::MaybeUser;
use super::oauth::OAUTH_STATE_COOKIE;
use super::session::{SESSION_COOKIE, issue_session, removal_cookie, session_cookie};
use crate::AppState;
use crate::api::pages::{error_block, escape, layout};
use crate::error::AppError;
use crate::metrics::{REGISTRATIONS_TOTAL, observe_login};
use crate::service::{INVALID_CREDENTIALS, NewAccount};

/// Shown for every failed GitHub sign-in, whatever the cause
pub const GITHUB_FAILURE_MESSAGE: &str = "GitHub authentication failed. Please try again.";

/// Create local authentication router
///
/// Routes:
/// - GET/POST /login - Login form
/// - GET/POST /register - Registration form
/// - POST /logout - Logout
pub fn local_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", post(logout))
}

// =============================================================================
// Login
// =============================================================================

#[derive(Debug, Deserialize)]
struct LoginPageQuery {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

/// GET /login
///
/// `?error=github` shows the generic GitHub failure message.
async fn login_page(
    MaybeUser(session): MaybeUser,
    Query(query): Query<LoginPageQuery>,
) -> Response {
    if session.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let error = query
        .error
        .as_deref()
        .filter(|error| *error == "github")
        .map(|_| GITHUB_FAILURE_MESSAGE);

    login_form(error, "").into_response()
}

/// POST /login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match state.accounts.authenticate(&form.email, &form.password).await {
        Ok(account) => {
            observe_login("password", "success");
            tracing::info!(account_id = %account.id, "Password login succeeded");
            let token = issue_session(&account, &state.config)?;
            let jar = jar.add(session_cookie(token, &state.config));
            Ok((jar, Redirect::to("/dashboard")).into_response())
        }
        Err(AppError::Unauthorized) => {
            observe_login("password", "failure");
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                login_form(Some(INVALID_CREDENTIALS), &form.email),
            )
                .into_response())
        }
        Err(error) => Err(error),
    }
}

fn login_form(error: Option<&str>, email: &str) -> impl IntoResponse {
    let body = format!(
        r#"<h1>Login</h1>
{error}
<form method="POST" action="/login">
    <label for="email">Email Address</label>
    <input type="email" id="email" name="email" value="{email}" required autofocus>
    <label for="password">Password</label>
    <input type="password" id="password" name="password" required>
    <button type="submit">Login</button>
</form>
<a href="/auth/github">Sign in with GitHub</a>
<p>Don't have an account? <a href="/register">Register</a></p>"#,
        error = error_block(error),
        email = escape(email),
    );

    layout("Login", &body)
}

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Deserialize)]
struct RegisterForm {
    name: String,
    email: String,
    password: String,
    password_confirmation: String,
}

/// GET /register
async fn register_page(MaybeUser(session): MaybeUser) -> Response {
    if session.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    register_form(None, "", "").into_response()
}

/// POST /register
async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let (name, email) = (form.name.clone(), form.email.clone());
    let result = state
        .accounts
        .register(NewAccount {
            name: form.name,
            email: form.email,
            password: form.password,
            password_confirmation: form.password_confirmation,
        })
        .await;

    match result {
        Ok(account) => {
            REGISTRATIONS_TOTAL.with_label_values(&["success"]).inc();
            let token = issue_session(&account, &state.config)?;
            let jar = jar.add(session_cookie(token, &state.config));
            Ok((jar, Redirect::to("/dashboard")).into_response())
        }
        Err(AppError::Validation(message)) => {
            REGISTRATIONS_TOTAL.with_label_values(&["rejected"]).inc();
            Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                register_form(Some(&message), &name, &email),
            )
                .into_response())
        }
        Err(error) => {
            REGISTRATIONS_TOTAL.with_label_values(&["error"]).inc();
            Err(error)
        }
    }
}

fn register_form(error: Option<&str>, name: &str, email: &str) -> impl IntoResponse {
    let body = format!(
        r#"<h1>Create Account</h1>
{error}
<form method="POST" action="/register">
    <label for="name">Full Name</label>
    <input type="text" id="name" name="name" value="{name}" required autofocus>
    <label for="email">Email Address</label>
    <input type="email" id="email" name="email" value="{email}" required>
    <label for="password">Password</label>
    <input type="password" id="password" name="password" required minlength="8">
    <label for="password-confirm">Confirm Password</label>
    <input type="password" id="password-confirm" name="password_confirmation" required>
    <button type="submit">Register</button>
</form>
<a href="/auth/github">Sign up with GitHub</a>
<p>Already have an account? <a href="/login">Login</a></p>"#,
        error = error_block(error),
        name = escape(name),
        email = escape(email),
    );

    layout("Register", &body)
}

// =============================================================================
// Logout
// =============================================================================

/// POST /logout
///
/// Clears session cookies and redirects to login.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(removal_cookie(SESSION_COOKIE))
        .remove(removal_cookie(OAUTH_STATE_COOKIE));
    (jar, Redirect::to("/login"))
}
