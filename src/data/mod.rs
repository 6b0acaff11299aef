//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite credential store
//! - Store abstraction used by the identity resolver

mod database;
mod models;

use std::future::Future;

pub use database::Database;
pub use models::*;

use crate::error::AppError;

/// Persistence operations needed by account services.
///
/// `insert` and `update` report uniqueness violations on `email` or
/// `external_id` as [`AppError::Conflict`].
pub trait AccountStore: Send + Sync {
    fn find_by_id(&self, id: &str)
    -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    /// `email` must already be normalized.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Account>, AppError>> + Send;

    fn insert(&self, account: &Account) -> impl Future<Output = Result<Account, AppError>> + Send;

    /// Overwrites the mutable columns of an existing row.
    ///
    /// Fails with `Conflict` if the stored row has meanwhile been linked to a
    /// different external identity, and with `NotFound` if the row is gone.
    fn update(&self, account: &Account) -> impl Future<Output = Result<Account, AppError>> + Send;
}
