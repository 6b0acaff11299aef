//! Data models
//!
//! Rust structs representing database entities.
//! All models use ULID for IDs and chrono for timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Entity ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Account
// =============================================================================

/// A stored user account
///
/// Created by local registration or by the first GitHub login.
/// `email` is always stored normalized (see [`normalize_email`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Hash of a random secret for GitHub-only accounts.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// False when `password_hash` covers a generated secret nobody knows
    pub password_set: bool,
    /// GitHub user id
    pub external_id: Option<String>,
    #[serde(skip_serializing)]
    pub external_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub external_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether a GitHub identity is attached
    pub fn is_linked(&self) -> bool {
        self.external_id.is_some()
    }
}

// =============================================================================
// External profile
// =============================================================================

/// Profile returned by the OAuth client adapter for one callback.
///
/// Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedExternalProfile {
    pub external_id: String,
    /// Absent when the provider withholds it
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Provider login handle, used when there is no display name
    pub handle: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

// =============================================================================
// Email
// =============================================================================

/// Canonical form used for storage and every uniqueness lookup.
///
/// Trims surrounding whitespace and lowercases the whole address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
