//! Account service
//!
//! Local registration and password login. Shares email normalization and
//! the store's uniqueness rules with the identity resolver.

use std::sync::Arc;

use chrono::Utc;

use super::identity::in_placeholder_domain;
use crate::auth::password::{hash_password, verify_password};
use crate::data::{Account, AccountStore, EntityId, normalize_email};
use crate::error::AppError;

const MAX_FIELD_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 8;

/// Message shown for any failed password login
pub const INVALID_CREDENTIALS: &str = "These credentials do not match our records.";

/// Registration input as submitted
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Account service
pub struct AccountService<S> {
    store: Arc<S>,
    placeholder_domain: String,
}

impl<S: AccountStore> AccountService<S> {
    /// Create new account service
    pub fn new(store: Arc<S>, placeholder_domain: &str) -> Self {
        Self {
            store,
            placeholder_domain: placeholder_domain.to_string(),
        }
    }

    /// Get an account by id
    pub async fn get_account(&self, id: &str) -> Result<Account, AppError> {
        self.store.find_by_id(id).await?.ok_or(AppError::NotFound)
    }

    /// Register a local account
    ///
    /// # Errors
    /// `Validation` with a user-facing message for bad input or a taken email
    pub async fn register(&self, input: NewAccount) -> Result<Account, AppError> {
        let name = input.name.trim().to_string();
        let email = normalize_email(&input.email);
        self.validate(&name, &email, &input.password, &input.password_confirmation)?;

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(email_taken());
        }

        let now = Utc::now();
        let account = Account {
            id: EntityId::new().0,
            name,
            email,
            password_hash: hash_password(input.password).await?,
            password_set: true,
            external_id: None,
            external_access_token: None,
            external_refresh_token: None,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert(&account).await {
            Ok(account) => {
                tracing::info!(account_id = %account.id, "Local account registered");
                Ok(account)
            }
            // Lost a race against another registration or a GitHub login
            Err(AppError::Conflict(_)) => Err(email_taken()),
            Err(error) => Err(error),
        }
    }

    /// Check an email/password pair
    ///
    /// Accounts created through GitHub have no chosen password and never
    /// authenticate here.
    ///
    /// # Errors
    /// `Unauthorized` for unknown email, wrong password or GitHub-only account
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let email = normalize_email(email);
        let Some(account) = self.store.find_by_email(&email).await? else {
            return Err(AppError::Unauthorized);
        };

        if !account.password_set {
            tracing::debug!(account_id = %account.id, "Password login refused for GitHub-only account");
            return Err(AppError::Unauthorized);
        }

        if !verify_password(password.to_string(), account.password_hash.clone()).await? {
            return Err(AppError::Unauthorized);
        }

        Ok(account)
    }

    fn validate(
        &self,
        name: &str,
        email: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<(), AppError> {
        if name.is_empty() {
            return Err(AppError::Validation("The name field is required.".to_string()));
        }
        if name.chars().count() > MAX_FIELD_LEN {
            return Err(AppError::Validation(format!(
                "The name may not be greater than {MAX_FIELD_LEN} characters."
            )));
        }
        if !looks_like_email(email) || email.chars().count() > MAX_FIELD_LEN {
            return Err(AppError::Validation(
                "The email must be a valid email address.".to_string(),
            ));
        }
        if in_placeholder_domain(email, &self.placeholder_domain) {
            return Err(AppError::Validation(
                "The email must be a valid email address.".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "The password must be at least {MIN_PASSWORD_LEN} characters."
            )));
        }
        if password != password_confirmation {
            return Err(AppError::Validation(
                "The password confirmation does not match.".to_string(),
            ));
        }
        Ok(())
    }
}

fn email_taken() -> AppError {
    AppError::Validation("The email has already been taken.".to_string())
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Database, NormalizedExternalProfile};
    use crate::service::IdentityResolver;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Store where a GitHub login for the same email is saved just before
    /// the first insert
    struct GitHubLoginFirst {
        inner: Arc<Database>,
        raced: AtomicBool,
    }

    impl AccountStore for GitHubLoginFirst {
        async fn find_by_id(&self, id: &str) -> Result<Option<Account>, AppError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AppError> {
            self.inner.find_by_external_id(external_id).await
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
            self.inner.find_by_email(email).await
        }

        async fn insert(&self, account: &Account) -> Result<Account, AppError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let resolver = IdentityResolver::new(
                    self.inner.clone(),
                    &crate::config::tests::valid_config().auth.github,
                );
                resolver
                    .resolve(&NormalizedExternalProfile {
                        external_id: "77".to_string(),
                        email: Some(account.email.clone()),
                        display_name: Some("Ada on GitHub".to_string()),
                        handle: Some("ada".to_string()),
                        access_token: "token".to_string(),
                        refresh_token: None,
                    })
                    .await?;
            }
            self.inner.insert(account).await
        }

        async fn update(&self, account: &Account) -> Result<Account, AppError> {
            self.inner.update(account).await
        }
    }

    async fn service() -> (AccountService<Database>, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        (
            AccountService::new(db.clone(), "users.noreply.invalid"),
            db,
            temp_dir,
        )
    }

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: "analytical-engine".to_string(),
            password_confirmation: "analytical-engine".to_string(),
        }
    }

    fn validation_message(error: AppError) -> String {
        match error {
            AppError::Validation(message) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_normalizes_email_and_hashes_password() {
        let (service, _db, _temp_dir) = service().await;

        let account = service
            .register(new_account("  Ada@Example.COM "))
            .await
            .unwrap();

        assert_eq!(account.email, "ada@example.com");
        assert!(account.password_set);
        assert_ne!(account.password_hash, "analytical-engine");
        assert!(account.external_id.is_none());
    }

    #[tokio::test]
    async fn register_rejects_taken_email_regardless_of_case() {
        let (service, _db, _temp_dir) = service().await;
        service.register(new_account("ada@example.com")).await.unwrap();

        let error = service
            .register(new_account("ADA@example.com"))
            .await
            .unwrap_err();
        assert_eq!(validation_message(error), "The email has already been taken.");
    }

    #[tokio::test]
    async fn register_losing_race_to_github_login_reports_taken_email() {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        let service = AccountService::new(
            Arc::new(GitHubLoginFirst {
                inner: db.clone(),
                raced: AtomicBool::new(false),
            }),
            "users.noreply.invalid",
        );

        let error = service
            .register(new_account("ada@example.com"))
            .await
            .unwrap_err();

        assert_eq!(validation_message(error), "The email has already been taken.");
        let stored = db.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(stored.external_id.as_deref(), Some("77"));
        assert!(!stored.password_set);
        assert_eq!(db.count_accounts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn register_rejects_placeholder_domain() {
        let (service, _db, _temp_dir) = service().await;

        let error = service
            .register(new_account("github-99@users.noreply.invalid"))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let (service, _db, _temp_dir) = service().await;

        let mut short = new_account("a@example.com");
        short.password = "short".to_string();
        short.password_confirmation = "short".to_string();
        assert!(
            validation_message(service.register(short).await.unwrap_err())
                .contains("at least 8")
        );

        let mut mismatch = new_account("a@example.com");
        mismatch.password_confirmation = "something-else".to_string();
        assert!(
            validation_message(service.register(mismatch).await.unwrap_err())
                .contains("confirmation")
        );

        let mut nameless = new_account("a@example.com");
        nameless.name = "   ".to_string();
        assert!(
            validation_message(service.register(nameless).await.unwrap_err())
                .contains("name")
        );

        assert!(matches!(
            service.register(new_account("not-an-email")).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn authenticate_accepts_correct_password_only() {
        let (service, _db, _temp_dir) = service().await;
        let registered = service.register(new_account("ada@example.com")).await.unwrap();

        let account = service
            .authenticate(" ADA@example.com", "analytical-engine")
            .await
            .unwrap();
        assert_eq!(account.id, registered.id);

        assert!(matches!(
            service.authenticate("ada@example.com", "wrong-password").await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            service.authenticate("nobody@example.com", "analytical-engine").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn github_only_accounts_cannot_use_password_login() {
        let (service, db, _temp_dir) = service().await;
        let resolver = IdentityResolver::new(
            db.clone(),
            &crate::config::tests::valid_config().auth.github,
        );
        let account = resolver
            .resolve(&NormalizedExternalProfile {
                external_id: "12".to_string(),
                email: Some("octo@example.com".to_string()),
                display_name: Some("Octo".to_string()),
                handle: Some("octo".to_string()),
                access_token: "token".to_string(),
                refresh_token: None,
            })
            .await
            .unwrap();
        assert!(!account.password_set);

        assert!(matches!(
            service.authenticate("octo@example.com", "").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn registered_account_is_linked_by_github_login() {
        let (service, db, _temp_dir) = service().await;
        let registered = service
            .register(new_account("Ada@Example.com"))
            .await
            .unwrap();

        let resolver = IdentityResolver::new(
            db.clone(),
            &crate::config::tests::valid_config().auth.github,
        );
        let linked = resolver
            .resolve(&NormalizedExternalProfile {
                external_id: "42".to_string(),
                email: Some("ada@EXAMPLE.com".to_string()),
                display_name: Some("Ada".to_string()),
                handle: None,
                access_token: "token".to_string(),
                refresh_token: None,
            })
            .await
            .unwrap();

        assert_eq!(linked.id, registered.id);
        assert_eq!(db.count_accounts().await.unwrap(), 1);
        // Password login keeps working after linking
        assert!(
            service
                .authenticate("ada@example.com", "analytical-engine")
                .await
                .is_ok()
        );
    }
}
