//! Bearer token lifecycle: generation, hashing, format validation,
//! resolution and revocation.
//!
//! The plaintext leaves this module exactly once, inside the [`Token`]
//! returned by [`TokenLifecycle::issue`]. Only the SHA-256 hash is handed
//! to the identity store.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::TokenConfig;
use crate::identity::{Account, AccountId, Scope};
use crate::store::{IdentityStore, StoreError, TokenRecord};

/// Random bytes per token before encoding.
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Length of an encoded plaintext (base32, no padding, of 16 bytes).
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

/// SHA-256 digest of a token plaintext.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    /// Hash a plaintext. Pure and deterministic.
    pub fn of(plaintext: &str) -> Self {
        let digest = Sha256::digest(plaintext.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenHash({})", self)
    }
}

impl Serialize for TokenHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TokenHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A freshly issued token.
///
/// Serializes as `{"token": <plaintext>, "expiry": ...}` for the one
/// response that hands the plaintext to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(skip)]
    pub account_id: AccountId,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: Scope,
}

impl Token {
    /// Build a token from caller-supplied entropy.
    pub fn from_entropy(
        entropy: [u8; TOKEN_ENTROPY_BYTES],
        account_id: AccountId,
        expiry: DateTime<Utc>,
        scope: Scope,
    ) -> Self {
        let plaintext = BASE32_NOPAD.encode(&entropy);
        let hash = TokenHash::of(&plaintext);
        Self {
            plaintext,
            hash,
            account_id,
            expiry,
            scope,
        }
    }

    /// The persisted form of this token.
    pub fn record(&self) -> TokenRecord {
        TokenRecord {
            hash: self.hash,
            account_id: self.account_id,
            expiry: self.expiry,
            scope: self.scope,
        }
    }
}

/// Field-level validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Record `message` for `field` when `ok` is false. First message per field wins.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.0
                .entry(field.to_string())
                .or_insert_with(|| message.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field, message)?;
        }
        Ok(())
    }
}

/// Errors raised by the token lifecycle.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Validation(ValidationErrors),

    /// No live token matched (unknown, wrong scope, or expired).
    #[error("token not found")]
    NotFound,

    #[error("token ttl must be positive")]
    InvalidTtl,

    #[error("failed to gather token entropy: {0}")]
    Entropy(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => TokenError::NotFound,
            other => TokenError::Store(other),
        }
    }
}

/// Check that a plaintext has the issued shape.
pub fn validate_format(plaintext: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.check(!plaintext.is_empty(), "token", "must be provided");
    errors.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Issues, resolves and revokes tokens against an identity store.
pub struct TokenLifecycle {
    store: Arc<dyn IdentityStore>,
    config: TokenConfig,
}

impl TokenLifecycle {
    pub fn new(store: Arc<dyn IdentityStore>, config: TokenConfig) -> Self {
        Self { store, config }
    }

    /// Configured time-to-live for tokens of `scope`.
    pub fn ttl_for(&self, scope: Scope) -> Duration {
        match scope {
            Scope::Activation => Duration::from_secs(self.config.activation_ttl_secs),
            Scope::Authentication => Duration::from_secs(self.config.authentication_ttl_secs),
        }
    }

    /// Generate, persist and return a new token.
    pub async fn issue(
        &self,
        account_id: AccountId,
        ttl: Duration,
        scope: Scope,
    ) -> Result<Token, TokenError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| TokenError::InvalidTtl)?;
        if ttl <= chrono::Duration::zero() {
            return Err(TokenError::InvalidTtl);
        }

        let mut entropy = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut entropy)
            .map_err(|e| TokenError::Entropy(e.to_string()))?;

        let token = Token::from_entropy(entropy, account_id, Utc::now() + ttl, scope);
        self.store.insert_token(&token.record()).await?;

        tracing::debug!(
            account_id = %account_id,
            scope = %scope,
            expiry = %token.expiry,
            "Token issued"
        );
        Ok(token)
    }

    /// Issue a token using the configured TTL for `scope`.
    pub async fn issue_for_scope(
        &self,
        account_id: AccountId,
        scope: Scope,
    ) -> Result<Token, TokenError> {
        self.issue(account_id, self.ttl_for(scope), scope).await
    }

    /// Resolve a plaintext to its owning account as of now.
    pub async fn resolve(&self, scope: Scope, plaintext: &str) -> Result<Account, TokenError> {
        self.resolve_at(scope, plaintext, Utc::now()).await
    }

    /// Resolve a plaintext to its owning account as of `now`.
    pub async fn resolve_at(
        &self,
        scope: Scope,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, TokenError> {
        validate_format(plaintext).map_err(TokenError::Validation)?;

        let hash = TokenHash::of(plaintext);
        let owner = self.store.find_identity_by_token(scope, &hash).await?;

        if owner.expiry <= now {
            tracing::debug!(
                account_id = %owner.account.id,
                scope = %scope,
                expiry = %owner.expiry,
                "Expired token presented"
            );
            return Err(TokenError::NotFound);
        }
        Ok(owner.account)
    }

    /// Delete every token of `scope` owned by `account_id`.
    pub async fn revoke_all(&self, scope: Scope, account_id: AccountId) -> Result<(), TokenError> {
        self.store.delete_tokens(scope, account_id).await?;
        tracing::debug!(account_id = %account_id, scope = %scope, "Tokens revoked");
        Ok(())
    }

    /// Resolve a token and revoke every token of its scope for the owner.
    pub async fn consume(&self, scope: Scope, plaintext: &str) -> Result<Account, TokenError> {
        let account = self.resolve(scope, plaintext).await?;
        self.revoke_all(scope, account.id).await?;
        Ok(account)
    }
}
