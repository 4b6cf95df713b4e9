//! Caller identities, token scopes and capability codes.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → auth::authenticator (Anonymous | Account)
//!     → auth::authorizer (activation, capability codes)
//!     → request extensions (visible to the forwarding handler)
//! ```
//!
//! Identities are resolved per request and never mutated by the gate.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an account in the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A known account as seen by the admission pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub activated: bool,
}

/// The resolved caller of a request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// Unauthenticated caller. Never activated, never holds capabilities.
    #[default]
    Anonymous,
    Account(Account),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn account(&self) -> Option<&Account> {
        match self {
            Identity::Anonymous => None,
            Identity::Account(account) => Some(account),
        }
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.account().map(|a| a.id)
    }

    pub fn is_activated(&self) -> bool {
        self.account().is_some_and(|a| a.activated)
    }
}

impl From<Account> for Identity {
    fn from(account: Account) -> Self {
        Identity::Account(account)
    }
}

/// Intended use of a token. Resolution always matches on scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability codes granted to an account (e.g. `movies:read`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(HashSet<String>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn insert(&mut self, code: impl Into<String>) {
        self.0.insert(code.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Capabilities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
