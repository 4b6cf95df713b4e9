//! Bearer credential authentication.
//!
//! # State Machine
//! ```text
//! no header            → Anonymous
//! header not "Bearer X" → InvalidCredential
//! X badly formed       → InvalidCredential
//! X unknown / expired  → InvalidCredential
//! store failure        → Upstream
//! X live               → Account
//! ```
//!
//! Every credential failure maps to the same rejection so a caller cannot
//! tell a malformed token from an unknown one.

use std::sync::Arc;

use crate::auth::token::{validate_format, TokenError, TokenLifecycle};
use crate::identity::{Identity, Scope};
use crate::pipeline::AdmissionError;

pub struct Authenticator {
    tokens: Arc<TokenLifecycle>,
}

impl Authenticator {
    pub fn new(tokens: Arc<TokenLifecycle>) -> Self {
        Self { tokens }
    }

    /// Resolve the caller from the raw `Authorization` header value.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Identity, AdmissionError> {
        let header = match header {
            None | Some("") => return Ok(Identity::Anonymous),
            Some(h) => h,
        };

        let token = parse_bearer(header).ok_or(AdmissionError::InvalidCredential)?;

        if let Err(errors) = validate_format(token) {
            tracing::debug!(%errors, "Rejected badly formed bearer token");
            return Err(AdmissionError::InvalidCredential);
        }

        match self.tokens.resolve(Scope::Authentication, token).await {
            Ok(account) => Ok(Identity::Account(account)),
            Err(TokenError::NotFound) | Err(TokenError::Validation(_)) => {
                Err(AdmissionError::InvalidCredential)
            }
            Err(TokenError::Store(err)) => Err(AdmissionError::Upstream(err)),
            Err(err) => Err(AdmissionError::Internal(err.to_string())),
        }
    }
}

/// Extract `<token>` from `"Bearer <token>"`. Any other shape is `None`.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Some(token),
        _ => None,
    }
}
