//! Identity store collaborator.
//!
//! # Data Flow
//! ```text
//! auth::token / auth::authorizer
//!     → deadline.rs (bounds every call)
//!     → remote.rs (identity service over HTTP) | memory.rs (in-process fake)
//! ```
//!
//! The gate never owns account or grant data. It reads identities and
//! capability codes and writes/deletes token records through this trait.

pub mod deadline;
pub mod memory;
pub mod remote;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::token::TokenHash;
use crate::identity::{Account, AccountId, Capabilities, Scope};

pub use deadline::DeadlineStore;
pub use memory::InMemoryIdentityStore;
pub use remote::RemoteIdentityStore;

/// Persisted form of a token. The plaintext is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub hash: TokenHash,
    pub account_id: AccountId,
    pub expiry: DateTime<Utc>,
    pub scope: Scope,
}

/// Result of a token hash lookup: the owning account and the token's expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOwner {
    pub account: Account,
    pub expiry: DateTime<Utc>,
}

/// Errors raised by identity store implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No record matched the lookup.
    #[error("record not found")]
    NotFound,

    /// The call did not complete within the configured deadline.
    #[error("identity store call exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    /// The store could not be reached.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with something unexpected.
    #[error("identity store error: {0}")]
    Backend(String),
}

/// Narrow interface to the identity store.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find the owner of a token by scope and hash. Expiry is returned, not filtered.
    async fn find_identity_by_token(
        &self,
        scope: Scope,
        hash: &TokenHash,
    ) -> Result<TokenOwner, StoreError>;

    /// All capability codes granted to an account.
    async fn find_capabilities(&self, account: AccountId) -> Result<Capabilities, StoreError>;

    async fn insert_token(&self, record: &TokenRecord) -> Result<(), StoreError>;

    /// Delete every token of `scope` owned by `account`.
    async fn delete_tokens(&self, scope: Scope, account: AccountId) -> Result<(), StoreError>;
}
