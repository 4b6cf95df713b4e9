//! Rejection outcomes of the admission pipeline.

use axum::http::StatusCode;
use thiserror::Error;

use crate::routing::path::PathError;
use crate::store::StoreError;

/// Why a request was not admitted.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("rate limit exceeded")]
    RateLimited,

    /// Malformed header, badly formed token, unknown or expired token.
    #[error("invalid or missing authentication token")]
    InvalidCredential,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("inactive account")]
    InactiveAccount,

    #[error("not permitted")]
    NotPermitted,

    #[error("malformed request path: {0}")]
    MalformedPath(#[from] PathError),

    #[error("identity store failure: {0}")]
    Upstream(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AdmissionError {
    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AdmissionError::InvalidCredential | AdmissionError::AuthenticationRequired => {
                StatusCode::UNAUTHORIZED
            }
            AdmissionError::InactiveAccount | AdmissionError::NotPermitted => StatusCode::FORBIDDEN,
            AdmissionError::MalformedPath(_) => StatusCode::BAD_REQUEST,
            AdmissionError::Upstream(_) | AdmissionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::RateLimited => "RATE_LIMIT_EXCEEDED",
            AdmissionError::InvalidCredential => "INVALID_AUTHENTICATION_TOKEN",
            AdmissionError::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            AdmissionError::InactiveAccount => "INACTIVE_ACCOUNT",
            AdmissionError::NotPermitted => "NOT_PERMITTED",
            AdmissionError::MalformedPath(_) => "BAD_REQUEST",
            AdmissionError::Upstream(_) | AdmissionError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Client-facing message. Never includes internal detail.
    pub fn public_message(&self) -> &'static str {
        match self {
            AdmissionError::RateLimited => "rate limit exceeded",
            AdmissionError::InvalidCredential => "invalid or missing authentication token",
            AdmissionError::AuthenticationRequired => {
                "you must be authenticated to access this resource"
            }
            AdmissionError::InactiveAccount => {
                "your user account must be activated to access this resource"
            }
            AdmissionError::NotPermitted => {
                "your user account doesn't have the necessary permissions to access this resource"
            }
            AdmissionError::MalformedPath(_) => "the request path is malformed",
            AdmissionError::Upstream(_) | AdmissionError::Internal(_) => {
                "the server encountered a problem and could not process your request"
            }
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status().is_server_error()
    }
}
