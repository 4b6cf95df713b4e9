//! Error responses.
//!
//! # Responsibilities
//! - Render rejections as the JSON error envelope
//! - Add `Vary: Authorization`, and `WWW-Authenticate: Bearer` on credential rejections
//! - Render upstream failures as 502
//!
//! # Design Decisions
//! - Internal detail never reaches the body; the middleware logs it
//! - `details` is always present, possibly empty

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::AdmissionError;

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    details: &'a [String],
}

/// Render the JSON error envelope with `Vary: Authorization`.
pub fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            code,
            message,
            details: &[],
        },
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::VARY, HeaderValue::from_static("authorization"));
    response
}

/// The upstream resource API could not be reached.
pub fn bad_gateway() -> Response {
    error_response(
        StatusCode::BAD_GATEWAY,
        "BAD_GATEWAY",
        "the upstream server could not be reached",
    )
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let mut response = error_response(self.status(), self.code(), self.public_message());
        if matches!(self, AdmissionError::InvalidCredential) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_credential_response() {
        let response = AdmissionError::InvalidCredential.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(response.headers()[header::VARY], "authorization");

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_AUTHENTICATION_TOKEN");
        assert_eq!(body["error"]["message"], "invalid or missing authentication token");
        assert_eq!(body["error"]["details"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_forbidden_has_no_challenge() {
        let response = AdmissionError::NotPermitted.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic() {
        let err = AdmissionError::Upstream(StoreError::Unavailable("10.0.0.3 refused".into()));
        let body = body_json(err.into_response()).await;
        assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
        assert!(!body.to_string().contains("10.0.0.3"));
    }

    #[tokio::test]
    async fn test_bad_gateway() {
        let response = bad_gateway();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BAD_GATEWAY");
    }
}
