//! Service layer
//!
//! Business logic on top of the data layer:
//! - External identity resolution (GitHub logins)
//! - Local registration and password login

mod account;
mod identity;

pub use account::{AccountService, INVALID_CREDENTIALS, NewAccount};
pub use identity::{
    IdentityResolver, Resolution, ResolutionOutcome, in_placeholder_domain, placeholder_email,
};
