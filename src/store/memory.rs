//! In-process identity store.
//!
//! Deterministic fake used by tests and by local runs without an identity
//! service. Can be seeded from a JSON file and can simulate outages and
//! slow responses.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;

use crate::auth::token::TokenHash;
use crate::identity::{Account, AccountId, Capabilities, Scope};
use crate::store::{IdentityStore, StoreError, TokenOwner, TokenRecord};

#[derive(Debug, Clone, Default)]
struct AccountEntry {
    activated: bool,
    capabilities: Capabilities,
}

/// Seed file layout for [`InMemoryIdentityStore::load_seed`].
#[derive(Debug, Deserialize)]
struct Seed {
    #[serde(default)]
    accounts: Vec<SeedAccount>,
    #[serde(default)]
    tokens: Vec<SeedToken>,
}

#[derive(Debug, Deserialize)]
struct SeedAccount {
    id: AccountId,
    #[serde(default)]
    activated: bool,
    #[serde(default)]
    capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeedToken {
    /// Plaintext; only its hash is kept.
    token: String,
    account_id: AccountId,
    scope: Scope,
    expiry: DateTime<Utc>,
}

/// A thread-safe, in-memory identity store.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    accounts: DashMap<AccountId, AccountEntry>,
    tokens: DashMap<TokenHash, TokenRecord>,
    outage: AtomicBool,
    latency: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load accounts, grants and tokens from a JSON seed file.
    pub fn load_seed(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let seed: Seed = serde_json::from_reader(BufReader::new(file))?;

        let store = Self::new();
        for account in seed.accounts {
            store.add_account(account.id, account.activated);
            store.grant(account.id, account.capabilities);
        }
        for token in seed.tokens {
            let hash = TokenHash::of(&token.token);
            store.tokens.insert(
                hash,
                TokenRecord {
                    hash,
                    account_id: token.account_id,
                    expiry: token.expiry,
                    scope: token.scope,
                },
            );
        }

        tracing::info!(
            accounts = store.accounts.len(),
            tokens = store.tokens.len(),
            path = %path.display(),
            "Loaded identity seed"
        );
        Ok(store)
    }

    pub fn add_account(&self, id: AccountId, activated: bool) {
        self.accounts
            .entry(id)
            .and_modify(|e| e.activated = activated)
            .or_insert_with(|| AccountEntry {
                activated,
                capabilities: Capabilities::new(),
            });
    }

    pub fn set_activated(&self, id: AccountId, activated: bool) {
        if let Some(mut entry) = self.accounts.get_mut(&id) {
            entry.activated = activated;
        }
    }

    /// Grant capability codes to an existing account.
    pub fn grant<I, S>(&self, id: AccountId, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(mut entry) = self.accounts.get_mut(&id) {
            for code in codes {
                entry.capabilities.insert(code);
            }
        }
    }

    /// Number of stored tokens of `scope` owned by `account`.
    pub fn token_count(&self, scope: Scope, account: AccountId) -> usize {
        self.tokens
            .iter()
            .filter(|r| r.scope == scope && r.account_id == account)
            .count()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Total calls received through the [`IdentityStore`] trait.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.outage.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_identity_by_token(
        &self,
        scope: Scope,
        hash: &TokenHash,
    ) -> Result<TokenOwner, StoreError> {
        self.enter().await?;

        let record = self
            .tokens
            .get(hash)
            .filter(|r| r.scope == scope)
            .map(|r| r.value().clone())
            .ok_or(StoreError::NotFound)?;

        let entry = self
            .accounts
            .get(&record.account_id)
            .ok_or(StoreError::NotFound)?;

        Ok(TokenOwner {
            account: Account {
                id: record.account_id,
                activated: entry.activated,
            },
            expiry: record.expiry,
        })
    }

    async fn find_capabilities(&self, account: AccountId) -> Result<Capabilities, StoreError> {
        self.enter().await?;
        Ok(self
            .accounts
            .get(&account)
            .map(|e| e.capabilities.clone())
            .unwrap_or_default())
    }

    async fn insert_token(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.enter().await?;
        self.tokens.insert(record.hash, record.clone());
        Ok(())
    }

    async fn delete_tokens(&self, scope: Scope, account: AccountId) -> Result<(), StoreError> {
        self.enter().await?;
        self.tokens
            .retain(|_, r| !(r.scope == scope && r.account_id == account));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn record(plaintext: &str, account: i64, scope: Scope) -> TokenRecord {
        TokenRecord {
            hash: TokenHash::of(plaintext),
            account_id: AccountId(account),
            expiry: Utc::now() + ChronoDuration::hours(1),
            scope,
        }
    }

    #[tokio::test]
    async fn test_lookup_matches_scope() {
        let store = InMemoryIdentityStore::new();
        store.add_account(AccountId(1), true);
        let rec = record("token-a", 1, Scope::Authentication);
        store.insert_token(&rec).await.unwrap();

        let owner = store
            .find_identity_by_token(Scope::Authentication, &rec.hash)
            .await
            .unwrap();
        assert_eq!(owner.account.id, AccountId(1));
        assert!(owner.account.activated);

        let err = store
            .find_identity_by_token(Scope::Activation, &rec.hash)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound);
    }

    #[tokio::test]
    async fn test_delete_tokens_by_scope_and_account() {
        let store = InMemoryIdentityStore::new();
        store.add_account(AccountId(1), true);
        store.add_account(AccountId(2), true);
        store.insert_token(&record("a1", 1, Scope::Activation)).await.unwrap();
        store.insert_token(&record("a2", 1, Scope::Activation)).await.unwrap();
        store.insert_token(&record("s1", 1, Scope::Authentication)).await.unwrap();
        store.insert_token(&record("b1", 2, Scope::Activation)).await.unwrap();

        store.delete_tokens(Scope::Activation, AccountId(1)).await.unwrap();

        assert_eq!(store.token_count(Scope::Activation, AccountId(1)), 0);
        assert_eq!(store.token_count(Scope::Authentication, AccountId(1)), 1);
        assert_eq!(store.token_count(Scope::Activation, AccountId(2)), 1);
    }

    #[tokio::test]
    async fn test_outage_is_reported() {
        let store = InMemoryIdentityStore::new();
        store.set_outage(true);
        let err = store.find_capabilities(AccountId(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.calls(), 1);
    }

    #[test]
    fn test_load_seed() {
        let path = std::env::temp_dir().join(format!("gate_seed_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{
                "accounts": [{"id": 3, "activated": true, "capabilities": ["movies:read"]}],
                "tokens": [{
                    "token": "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
                    "account_id": 3,
                    "scope": "authentication",
                    "expiry": "2999-01-01T00:00:00Z"
                }]
            }"#,
        )
        .unwrap();

        let store = InMemoryIdentityStore::load_seed(&path).unwrap();
        assert_eq!(store.token_count(Scope::Authentication, AccountId(3)), 1);

        std::fs::remove_file(&path).unwrap_or_default();
    }
}
