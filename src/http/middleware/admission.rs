//! Admission middleware.
//! Runs the route's pipeline before anything reaches the upstream.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, uri::PathAndQuery, HeaderName, HeaderValue, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id_of;
use crate::observability::metrics;
use crate::pipeline::{AdmissionError, RequestContext};
use crate::routing::{canonicalize, PolicyRouter};

/// Header carrying the admitted account id to the upstream.
pub const X_ACCOUNT_ID: &str = "x-account-id";

#[derive(Clone)]
pub struct AdmissionState {
    pub router: Arc<ArcSwap<PolicyRouter>>,
}

pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();

    let mut response = match admit(&state, &mut req).await {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    };

    let headers = response.headers_mut();
    let varies_on_auth = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| v.trim().eq_ignore_ascii_case("authorization"));
    if !varies_on_auth {
        headers.append(header::VARY, HeaderValue::from_static("authorization"));
    }
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

async fn admit(state: &AdmissionState, req: &mut Request<Body>) -> Result<(), AdmissionError> {
    let request_id = request_id_of(req).to_string();

    if let Err(err) = canonicalize_uri(req) {
        return reject(&request_id, "default", err);
    }

    let client_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let authorization = match req.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(v) => Some(v.to_string()),
            Err(_) => return reject(&request_id, "default", AdmissionError::InvalidCredential),
        },
    };

    let (route, pipeline) = {
        let router = state.router.load();
        let selected = router.select(req.method(), req.uri().path());
        (selected.name.to_string(), selected.pipeline.clone())
    };

    let mut ctx = RequestContext::new(client_addr, authorization);
    if let Err(err) = pipeline.run(&mut ctx).await {
        return reject(&request_id, &route, err);
    }

    let account_header = HeaderName::from_static(X_ACCOUNT_ID);
    req.headers_mut().remove(&account_header);
    if let Some(id) = ctx.identity.account_id() {
        req.headers_mut().insert(account_header, HeaderValue::from(id.0));
    }

    tracing::debug!(
        request_id = %request_id,
        route = %route,
        account_id = ?ctx.identity.account_id(),
        "Request admitted"
    );
    req.extensions_mut().insert(ctx.identity);
    Ok(())
}

/// Replace the request path with its canonical form, keeping the query.
fn canonicalize_uri(req: &mut Request<Body>) -> Result<(), AdmissionError> {
    let canonical = match canonicalize(req.uri().path())? {
        Cow::Borrowed(_) => return Ok(()),
        Cow::Owned(path) => path,
    };
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{canonical}?{query}"),
        None => canonical,
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| AdmissionError::Internal(format!("canonical path rejected: {e}")))?,
    );
    *req.uri_mut() = Uri::from_parts(parts)
        .map_err(|e| AdmissionError::Internal(format!("canonical uri rejected: {e}")))?;
    Ok(())
}

fn reject(request_id: &str, route: &str, err: AdmissionError) -> Result<(), AdmissionError> {
    metrics::record_rejection(err.code());
    if err.is_internal() {
        tracing::error!(request_id = %request_id, route = %route, error = %err, "Admission failed");
    } else {
        tracing::debug!(
            request_id = %request_id,
            route = %route,
            code = err.code(),
            "Admission denied"
        );
    }
    Err(err)
}
