//! Deadline enforcement for identity store calls.
//!
//! Every call is wrapped in a Tokio timeout. An elapsed deadline becomes
//! [`StoreError::DeadlineExceeded`] and is never retried here.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::auth::token::TokenHash;
use crate::identity::{AccountId, Capabilities, Scope};
use crate::observability::metrics;
use crate::store::{IdentityStore, StoreError, TokenOwner, TokenRecord};

/// Decorator bounding every call to the inner store by a deadline.
pub struct DeadlineStore {
    inner: Arc<dyn IdentityStore>,
    deadline: Duration,
}

impl DeadlineStore {
    pub fn new(inner: Arc<dyn IdentityStore>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "Identity store deadline exceeded"
                );
                Err(StoreError::DeadlineExceeded(self.deadline))
            }
        };
        metrics::record_store_call(operation, outcome(&result), start);
        result
    }
}

fn outcome<T>(result: &Result<T, StoreError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(StoreError::NotFound) => "not_found",
        Err(StoreError::DeadlineExceeded(_)) => "deadline",
        Err(_) => "error",
    }
}

#[async_trait]
impl IdentityStore for DeadlineStore {
    async fn find_identity_by_token(
        &self,
        scope: Scope,
        hash: &TokenHash,
    ) -> Result<TokenOwner, StoreError> {
        self.call("find_identity_by_token", self.inner.find_identity_by_token(scope, hash))
            .await
    }

    async fn find_capabilities(&self, account: AccountId) -> Result<Capabilities, StoreError> {
        self.call("find_capabilities", self.inner.find_capabilities(account))
            .await
    }

    async fn insert_token(&self, record: &TokenRecord) -> Result<(), StoreError> {
        self.call("insert_token", self.inner.insert_token(record)).await
    }

    async fn delete_tokens(&self, scope: Scope, account: AccountId) -> Result<(), StoreError> {
        self.call("delete_tokens", self.inner.delete_tokens(scope, account))
            .await
    }
}
