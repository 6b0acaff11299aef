//! External identity resolution
//!
//! Maps a GitHub profile onto exactly one local account. Lookups run in a
//! fixed order (external id, then effective email, then create) and each
//! attempt performs at most one write. The store's unique indexes arbitrate
//! races: a conflicting write reruns the lookup once before giving up.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::password::hash_random_secret;
use crate::config::GitHubOAuthConfig;
use crate::data::{Account, AccountStore, EntityId, NormalizedExternalProfile, normalize_email};
use crate::error::AppError;
use crate::metrics::observe_resolution;

/// Prefix of synthesized emails
const PLACEHOLDER_PREFIX: &str = "github";

/// `github-<external_id>@<domain>`, normalized
pub fn placeholder_email(external_id: &str, domain: &str) -> String {
    normalize_email(&format!("{PLACEHOLDER_PREFIX}-{external_id}@{domain}"))
}

/// Whether `email` is inside `domain`, compared after normalization
pub fn in_placeholder_domain(email: &str, domain: &str) -> bool {
    let domain = normalize_email(domain);
    normalize_email(email)
        .rsplit_once('@')
        .is_some_and(|(_, email_domain)| email_domain == domain)
}

/// Which branch produced the account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Known external id; tokens refreshed
    Returning,
    /// Existing account with the same email now carries the external id
    Linked,
    /// New account
    Created,
}

impl ResolutionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionOutcome::Returning => "returning",
            ResolutionOutcome::Linked => "linked",
            ResolutionOutcome::Created => "created",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub account: Account,
    pub outcome: ResolutionOutcome,
}

/// Identity resolver over an account store
pub struct IdentityResolver<S> {
    store: Arc<S>,
    placeholder_domain: String,
    link_by_email: bool,
}

impl<S: AccountStore> IdentityResolver<S> {
    pub fn new(store: Arc<S>, github: &GitHubOAuthConfig) -> Self {
        Self {
            store,
            placeholder_domain: github.placeholder_domain.trim().to_lowercase(),
            link_by_email: github.link_by_email,
        }
    }

    /// Synthesized address for a user whose provider withheld the email
    ///
    /// Depends only on `external_id`.
    pub fn placeholder_email(&self, external_id: &str) -> String {
        placeholder_email(external_id, &self.placeholder_domain)
    }

    /// Whether `email` lies in the domain reserved for synthesized addresses
    pub fn is_placeholder_domain(&self, email: &str) -> bool {
        in_placeholder_domain(email, &self.placeholder_domain)
    }

    /// Email used for uniqueness lookups: the real one, or the placeholder
    pub fn effective_email(&self, profile: &NormalizedExternalProfile) -> String {
        match profile.email.as_deref().map(normalize_email) {
            Some(email) if !email.is_empty() => email,
            _ => self.placeholder_email(profile.external_id.trim()),
        }
    }

    /// Resolve a profile to its local account
    pub async fn resolve(&self, profile: &NormalizedExternalProfile) -> Result<Account, AppError> {
        self.resolve_with_outcome(profile)
            .await
            .map(|resolution| resolution.account)
    }

    /// Resolve a profile, reporting which branch was taken
    ///
    /// # Errors
    /// - `InvalidProfile` if the external id is empty, or a new account would
    ///   have neither display name nor handle
    /// - `Conflict` if the store rejected the write twice
    /// - `LinkRefused` if the email belongs to an account that may not be
    ///   linked; this is never retried
    /// - any store error
    pub async fn resolve_with_outcome(
        &self,
        profile: &NormalizedExternalProfile,
    ) -> Result<Resolution, AppError> {
        if profile.external_id.trim().is_empty() {
            observe_resolution("failed");
            return Err(AppError::InvalidProfile(
                "profile has an empty external id".to_string(),
            ));
        }

        let effective_email = self.effective_email(profile);

        let result = match self.attempt(profile, &effective_email).await {
            Err(AppError::Conflict(detail)) => {
                tracing::warn!(
                    external_id = %profile.external_id,
                    %detail,
                    "Identity resolution hit a uniqueness conflict; retrying once"
                );
                observe_resolution("conflict_retry");
                self.attempt(profile, &effective_email).await
            }
            other => other,
        };

        match &result {
            Ok(resolution) => {
                tracing::info!(
                    account_id = %resolution.account.id,
                    external_id = %profile.external_id,
                    outcome = resolution.outcome.as_str(),
                    "Resolved GitHub identity"
                );
                observe_resolution(resolution.outcome.as_str());
            }
            Err(AppError::LinkRefused(detail)) => {
                tracing::warn!(
                    external_id = %profile.external_id,
                    %detail,
                    "Identity resolution refused to link an existing account"
                );
                observe_resolution("refused");
            }
            Err(AppError::Conflict(detail)) => {
                tracing::error!(
                    external_id = %profile.external_id,
                    %detail,
                    "Identity resolution conflicted again after retry"
                );
                observe_resolution("failed");
            }
            Err(_) => observe_resolution("failed"),
        }

        result
    }

    async fn attempt(
        &self,
        profile: &NormalizedExternalProfile,
        effective_email: &str,
    ) -> Result<Resolution, AppError> {
        let external_id = profile.external_id.trim();

        if let Some(mut account) = self.store.find_by_external_id(external_id).await? {
            account.external_access_token = Some(profile.access_token.clone());
            account.external_refresh_token = profile.refresh_token.clone();
            let account = self.store.update(&account).await?;
            return Ok(Resolution {
                account,
                outcome: ResolutionOutcome::Returning,
            });
        }

        if let Some(mut account) = self.store.find_by_email(effective_email).await? {
            if !self.link_by_email {
                return Err(AppError::LinkRefused(format!(
                    "email of external id {external_id} belongs to an existing account and linking by email is disabled"
                )));
            }
            if account.external_id.is_some() {
                return Err(AppError::LinkRefused(format!(
                    "account {} is already linked to another external identity",
                    account.id
                )));
            }

            account.external_id = Some(external_id.to_string());
            account.external_access_token = Some(profile.access_token.clone());
            account.external_refresh_token = profile.refresh_token.clone();
            let account = self.store.update(&account).await?;
            return Ok(Resolution {
                account,
                outcome: ResolutionOutcome::Linked,
            });
        }

        let name = [profile.display_name.as_deref(), profile.handle.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .ok_or_else(|| {
                AppError::InvalidProfile(format!(
                    "profile for external id {external_id} has neither display name nor handle"
                ))
            })?
            .to_string();

        let now = Utc::now();
        let account = Account {
            id: EntityId::new().0,
            name,
            email: effective_email.to_string(),
            password_hash: hash_random_secret().await?,
            password_set: false,
            external_id: Some(external_id.to_string()),
            external_access_token: Some(profile.access_token.clone()),
            external_refresh_token: profile.refresh_token.clone(),
            created_at: now,
            updated_at: now,
        };

        let account = self.store.insert(&account).await?;
        Ok(Resolution {
            account,
            outcome: ResolutionOutcome::Created,
        })
    }
}
