//! Activation and capability checks on a resolved identity.
//!
//! Activation is always checked before permission; a permission check
//! assumes a known account.

use std::sync::Arc;

use crate::identity::{Account, Identity};
use crate::pipeline::AdmissionError;
use crate::store::IdentityStore;

pub struct Authorizer {
    store: Arc<dyn IdentityStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// Require a known, activated account.
    pub fn require_activated<'a>(
        &self,
        identity: &'a Identity,
    ) -> Result<&'a Account, AdmissionError> {
        match identity {
            Identity::Anonymous => Err(AdmissionError::AuthenticationRequired),
            Identity::Account(account) if !account.activated => {
                Err(AdmissionError::InactiveAccount)
            }
            Identity::Account(account) => Ok(account),
        }
    }

    /// Require that the account holds capability `code`.
    pub async fn require_permission(
        &self,
        identity: &Identity,
        code: &str,
    ) -> Result<(), AdmissionError> {
        let account = identity
            .account()
            .ok_or(AdmissionError::AuthenticationRequired)?;

        let capabilities = self
            .store
            .find_capabilities(account.id)
            .await
            .map_err(AdmissionError::Upstream)?;

        if capabilities.includes(code) {
            Ok(())
        } else {
            tracing::debug!(account_id = %account.id, capability = code, "Capability missing");
            Err(AdmissionError::NotPermitted)
        }
    }
}
