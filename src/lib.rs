//! Octolink - user registration, password login and GitHub sign-in
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - Login / register / logout forms                          │
//! │  - GitHub OAuth redirect + callback                         │
//! │  - Dashboard, metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Identity resolution (GitHub profile -> local account)    │
//! │  - Local registration and password login                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite (sqlx), unique email and GitHub id                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTML pages and metrics endpoint
//! - `auth`: GitHub OAuth, password auth, sessions
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// This struct is cloned for each request and contains
/// shared resources like the database pool and HTTP client.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Local registration and password login
    pub accounts: Arc<service::AccountService<data::Database>>,

    /// GitHub identity resolution
    pub identity: Arc<service::IdentityResolver<data::Database>>,

    /// GitHub OAuth client
    pub github: Arc<auth::GitHubClient>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Initialize HTTP client
    /// 3. Build services
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = Arc::new(data::Database::connect(&config.database.path).await?);
        metrics::USERS_TOTAL.set(db.count_accounts().await?);
        tracing::info!("Database connected");

        // 2. Initialize HTTP client
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("Octolink/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        // 3. Build services
        let github = Arc::new(auth::GitHubClient::new(&config, http_client));
        let identity = Arc::new(service::IdentityResolver::new(
            db.clone(),
            &config.auth.github,
        ));
        let accounts = Arc::new(service::AccountService::new(
            db.clone(),
            &config.auth.github.placeholder_domain,
        ));

        tracing::info!("Application state initialized successfully");

        Ok(Self {
            config: Arc::new(config),
            db,
            accounts,
            identity,
            github,
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    const MAX_FORM_BYTES: usize = 64 * 1024;

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::pages_router(state.clone()))
        .merge(auth::router())
        .merge(api::metrics_router(state.clone()))
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
