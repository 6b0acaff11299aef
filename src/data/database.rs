//! SQLite database operations
//!
//! All database access goes through this module.

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::AccountStore;
use super::models::*;
use crate::error::AppError;

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, password_set, external_id, \
     external_access_token, external_refresh_token, created_at, updated_at";

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!("Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Get an account by id
    pub async fn get_account_by_id(&self, id: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Get the account linked to a GitHub user id
    pub async fn get_account_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Get an account by email
    ///
    /// The column is `COLLATE NOCASE`; callers still pass the normalized form
    /// so that Unicode case folding matches what was stored.
    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Insert a new account
    ///
    /// # Errors
    /// `Conflict` if the email or external id is already taken
    pub async fn insert_account(&self, account: &Account) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, password_hash, password_set, external_id,
                external_access_token, external_refresh_token, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.password_set)
        .bind(&account.external_id)
        .bind(&account.external_access_token)
        .bind(&account.external_refresh_token)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_write)?;

        Ok(())
    }

    /// Update an existing account
    ///
    /// The write only applies while the stored row is unlinked or linked to
    /// the same external id as `account`, so a concurrent link to another
    /// GitHub user is never overwritten.
    ///
    /// # Returns
    /// `true` if a row was updated
    pub async fn update_account(&self, account: &Account) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name = ?,
                email = ?,
                password_hash = ?,
                password_set = ?,
                external_id = ?,
                external_access_token = ?,
                external_refresh_token = ?,
                updated_at = ?
            WHERE id = ?
              AND (external_id IS NULL OR external_id = ?)
            "#,
        )
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.password_set)
        .bind(&account.external_id)
        .bind(&account.external_access_token)
        .bind(&account.external_refresh_token)
        .bind(account.updated_at)
        .bind(&account.id)
        .bind(&account.external_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_write)?;

        Ok(result.rows_affected() > 0)
    }

    /// Count stored accounts
    pub async fn count_accounts(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

impl AccountStore for Database {
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AppError> {
        self.get_account_by_id(id).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AppError> {
        self.get_account_by_external_id(external_id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        self.get_account_by_email(email).await
    }

    async fn insert(&self, account: &Account) -> Result<Account, AppError> {
        self.insert_account(account).await?;
        crate::metrics::USERS_TOTAL.inc();
        Ok(account.clone())
    }

    async fn update(&self, account: &Account) -> Result<Account, AppError> {
        let mut account = account.clone();
        account.updated_at = Utc::now();

        if self.update_account(&account).await? {
            return Ok(account);
        }

        match self.get_account_by_id(&account.id).await? {
            Some(_) => Err(AppError::Conflict(format!(
                "account {} is linked to a different external identity",
                account.id
            ))),
            None => Err(AppError::NotFound),
        }
    }
}
