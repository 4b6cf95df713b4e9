//! Identity service client.
//!
//! # Responsibilities
//! - Resolve token hashes and capability grants over JSON/HTTP
//! - Persist and delete token records
//! - Map transport failures and unexpected statuses to [`StoreError`]
//!
//! # Wire Contract
//! ```text
//! GET    {base}/tokens/{scope}/{hash_hex}        → 200 TokenOwner | 404
//! GET    {base}/accounts/{id}/capabilities       → 200 ["code", ...]
//! POST   {base}/tokens                           ← TokenRecord
//! DELETE {base}/accounts/{id}/tokens/{scope}
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::auth::token::TokenHash;
use crate::identity::{AccountId, Capabilities, Scope};
use crate::store::{IdentityStore, StoreError, TokenOwner, TokenRecord};

/// Identity store backed by a remote identity service.
#[derive(Clone)]
pub struct RemoteIdentityStore {
    client: reqwest::Client,
    base: Url,
}

impl RemoteIdentityStore {
    /// Create a client for the service at `base_url`.
    ///
    /// `timeout` is a transport-level bound; the gate's deadline is applied
    /// separately by [`crate::store::DeadlineStore`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let mut base: Url = base_url.parse().map_err(|e| {
            StoreError::Backend(format!("invalid identity service URL '{}': {}", base_url, e))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base
            .join(path)
            .map_err(|e| StoreError::Backend(format!("invalid endpoint '{}': {}", path, e)))
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    if err.is_timeout() || err.is_connect() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

fn unexpected_status(status: StatusCode) -> StoreError {
    if status.is_server_error() {
        StoreError::Unavailable(format!("identity service answered {}", status))
    } else {
        StoreError::Backend(format!("identity service answered {}", status))
    }
}

#[async_trait]
impl IdentityStore for RemoteIdentityStore {
    async fn find_identity_by_token(
        &self,
        scope: Scope,
        hash: &TokenHash,
    ) -> Result<TokenOwner, StoreError> {
        let url = self.endpoint(&format!("tokens/{}/{}", scope, hash))?;
        let response = self.client.get(url).send().await.map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => response.json::<TokenOwner>().await.map_err(transport_error),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound),
            status => Err(unexpected_status(status)),
        }
    }

    async fn find_capabilities(&self, account: AccountId) -> Result<Capabilities, StoreError> {
        let url = self.endpoint(&format!("accounts/{}/capabilities", account))?;
        let response = self.client.get(url).send().await.map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => response.json::<Capabilities>().await.map_err(transport_error),
            // Unknown account holds no grants.
            StatusCode::NOT_FOUND => Ok(Capabilities::new()),
            status => Err(unexpected_status(status)),
        }
    }

    async fn insert_token(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let url = self.endpoint("tokens")?;
        let response = self
            .client
            .post(url)
            .json(record)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(unexpected_status(status))
        }
    }

    async fn delete_tokens(&self, scope: Scope, account: AccountId) -> Result<(), StoreError> {
        let url = self.endpoint(&format!("accounts/{}/tokens/{}", account, scope))?;
        let response = self.client.delete(url).send().await.map_err(transport_error)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(unexpected_status(status))
        }
    }
}
