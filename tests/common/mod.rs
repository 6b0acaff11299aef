//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use octolink::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Bearer token accepted by `/metrics` in tests
pub const METRICS_TOKEN: &str = "test-metrics-token";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: FakeGitHub,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance backed by a fake GitHub
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(customize: impl FnOnce(&mut config::AppConfig)) -> Self {
        let github = FakeGitHub::start().await;

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let mut config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig { path: db_path },
            auth: config::AuthConfig {
                session_secret: "test-secret-key-32-bytes-long!!!".to_string(),
                session_max_age: 604800,
                github: config::GitHubOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                    authorize_url: github.url("/login/oauth/authorize"),
                    token_url: github.url("/login/oauth/access_token"),
                    api_base_url: github.addr.clone(),
                    scopes: "read:user user:email".to_string(),
                    placeholder_domain: "users.noreply.invalid".to_string(),
                    link_by_email: true,
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
            metrics: config::MetricsConfig {
                token: Some(METRICS_TOKEN.to_string()),
            },
        };
        customize(&mut config);

        octolink::metrics::init_metrics();

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Client that does not follow redirects so tests can inspect them
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = octolink::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            github,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start the GitHub flow and return the issued CSRF state
    pub async fn begin_github_login(&self) -> String {
        let response = self
            .client
            .get(self.url("/auth/github"))
            .send()
            .await
            .expect("request succeeds");
        assert!(response.status().is_redirection());

        cookie_value(&response, "oauth_state").expect("oauth_state cookie")
    }

    /// Hit the callback with a matching state cookie
    pub async fn github_callback(&self, query: &str, csrf_state: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/auth/github/callback?{query}&state={csrf_state}")))
            .header("Cookie", format!("oauth_state={csrf_state}"))
            .send()
            .await
            .expect("request succeeds")
    }

    /// Complete a GitHub login for `code`, returning the session cookie value
    pub async fn github_login(&self, code: &str) -> String {
        let csrf_state = self.begin_github_login().await;
        let response = self
            .github_callback(&format!("code={code}"), &csrf_state)
            .await;

        assert_eq!(location(&response).as_deref(), Some("/dashboard"));
        cookie_value(&response, "session").expect("session cookie")
    }

    /// Submit the registration form
    pub async fn register(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/register"))
            .form(&[
                ("name", name),
                ("email", email),
                ("password", password),
                ("password_confirmation", password),
            ])
            .send()
            .await
            .expect("request succeeds")
    }

    /// Submit the login form
    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/login"))
            .form(&[("email", email), ("password", password)])
            .send()
            .await
            .expect("request succeeds")
    }

    /// GET a page with a session cookie
    pub async fn get_with_session(&self, path: &str, session: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Cookie", format!("session={session}"))
            .send()
            .await
            .expect("request succeeds")
    }
}

/// Value of a cookie set by `response`
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.strip_prefix(&prefix))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        .find(|value| !value.is_empty())
}

/// Redirect target of `response`
pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

// =============================================================================
// Fake GitHub
// =============================================================================

/// A GitHub user served by [`FakeGitHub`]
#[derive(Debug, Clone)]
pub struct FakeUser {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    /// Public profile email
    pub email: Option<String>,
    /// Entries of `/user/emails`; `None` answers 404
    pub emails: Option<Vec<(String, bool, bool)>>,
}

impl FakeUser {
    pub fn new(id: u64, login: &str) -> Self {
        Self {
            id,
            login: login.to_string(),
            name: None,
            email: None,
            emails: None,
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// (address, primary, verified)
    pub fn emails(mut self, emails: &[(&str, bool, bool)]) -> Self {
        self.emails = Some(
            emails
                .iter()
                .map(|(email, primary, verified)| (email.to_string(), *primary, *verified))
                .collect(),
        );
        self
    }
}

type Users = Arc<Mutex<HashMap<String, FakeUser>>>;

/// Token and user endpoints of GitHub, keyed by authorization code
///
/// Code `c` yields access token `gho_c`. Unknown codes answer like
/// GitHub does for an expired code.
#[derive(Clone)]
pub struct FakeGitHub {
    pub addr: String,
    users: Users,
}

impl FakeGitHub {
    pub async fn start() -> Self {
        let users: Users = Arc::new(Mutex::new(HashMap::new()));

        let app = Router::new()
            .route("/login/oauth/access_token", post(fake_token))
            .route("/user", get(fake_user))
            .route("/user/emails", get(fake_emails))
            .with_state(users.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, users }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Make `code` authenticate as `user`
    pub fn authorize(&self, code: &str, user: FakeUser) {
        self.users.lock().unwrap().insert(code.to_string(), user);
    }
}

fn user_for_token(users: &Users, headers: &HeaderMap) -> Option<FakeUser> {
    let code = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer gho_"))?;
    users.lock().unwrap().get(code).cloned()
}

async fn fake_token(State(users): State<Users>, Json(body): Json<Value>) -> Json<Value> {
    let code = body["code"].as_str().unwrap_or_default();
    if body["client_id"] != "test-client-id" || !users.lock().unwrap().contains_key(code) {
        return Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }));
    }

    Json(json!({
        "access_token": format!("gho_{code}"),
        "token_type": "bearer",
        "scope": "read:user,user:email"
    }))
}

async fn fake_user(State(users): State<Users>, headers: HeaderMap) -> Response {
    match user_for_token(&users, &headers) {
        Some(user) => Json(json!({
            "id": user.id,
            "login": user.login,
            "name": user.name,
            "email": user.email,
        }))
        .into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn fake_emails(State(users): State<Users>, headers: HeaderMap) -> Response {
    let Some(user) = user_for_token(&users, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match user.emails {
        Some(emails) => Json(
            emails
                .into_iter()
                .map(|(email, primary, verified)| {
                    json!({ "email": email, "primary": primary, "verified": verified })
                })
                .collect::<Vec<_>>(),
        )
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
