//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the forwarding handler
//! - Wire up middleware (admission, tracing, timeout, request ID, panic catch)
//! - Bind server to listener
//! - Forward admitted requests to the upstream
//! - Run the rate-limit reaper and apply config reloads

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, uri::Authority, uri::PathAndQuery, uri::Scheme, Request, Uri},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{Authenticator, Authorizer, TokenLifecycle};
use crate::config::GateConfig;
use crate::http::middleware::{admission_middleware, AdmissionState};
use crate::http::request::{propagate_request_id_layer, request_id_of, set_request_id_layer};
use crate::http::response::bad_gateway;
use crate::lifecycle::spawn_supervised;
use crate::pipeline::AdmissionError;
use crate::routing::{PipelineParts, PolicyRouter};
use crate::security::reaper::panic_message;
use crate::security::{BucketReaper, RateLimiter};
use crate::store::{DeadlineStore, IdentityStore};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream address '{0}'")]
    InvalidUpstream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// State injected into the forwarding handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
}

/// Shared admission components, built once per process.
#[derive(Clone)]
pub struct GateComponents {
    pub store: Arc<dyn IdentityStore>,
    pub tokens: Arc<TokenLifecycle>,
    pub parts: PipelineParts,
    pub router: Arc<ArcSwap<PolicyRouter>>,
}

impl GateComponents {
    /// Wrap `store` in the configured deadline and build every component on top.
    pub fn new(config: &GateConfig, store: Arc<dyn IdentityStore>) -> Self {
        let deadline = Duration::from_millis(config.identity_store.deadline_ms);
        let store: Arc<dyn IdentityStore> = Arc::new(DeadlineStore::new(store, deadline));

        let tokens = Arc::new(TokenLifecycle::new(store.clone(), config.tokens.clone()));
        let parts = PipelineParts {
            limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            authenticator: Arc::new(Authenticator::new(tokens.clone())),
            authorizer: Arc::new(Authorizer::new(store.clone())),
        };
        let router = Arc::new(ArcSwap::from_pointee(PolicyRouter::new(&config.routes, &parts)));

        Self {
            store,
            tokens,
            parts,
            router,
        }
    }

    /// Apply the reloadable parts of `config`.
    pub fn apply(&self, config: &GateConfig) {
        self.parts.limiter.reconfigure(config.rate_limit.clone());
        let router = PolicyRouter::new(&config.routes, &self.parts);
        let routes = router.len();
        self.router.store(Arc::new(router));
        tracing::info!(routes, "Applied configuration reload");
    }
}

/// HTTP server for the admission gate.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    components: GateComponents,
}

impl HttpServer {
    pub fn new(config: GateConfig, store: Arc<dyn IdentityStore>) -> Result<Self, ServerError> {
        let upstream = Authority::from_str(&config.upstream.address)
            .map_err(|_| ServerError::InvalidUpstream(config.upstream.address.clone()))?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let components = GateComponents::new(&config, store);

        let state = AppState { client, upstream };
        let router = Self::build_router(&config, &components, state);
        Ok(Self {
            router,
            config,
            components,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, components: &GateComponents, state: AppState) -> Router {
        let admission = AdmissionState {
            router: components.router.clone(),
        };
        Router::new()
            .route("/{*path}", any(forward_handler))
            .route("/", any(forward_handler))
            .with_state(state)
            .layer(from_fn_with_state(admission, admission_middleware))
            .layer(
                // Outermost first.
                ServiceBuilder::new()
                    .layer(CatchPanicLayer::custom(handle_panic))
                    .layer(set_request_id_layer())
                    .layer(propagate_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run until `shutdown` fires, applying configs from `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let reaper = BucketReaper::new(
            self.components.parts.limiter.clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
        );
        spawn_supervised("rate-limit-reaper", reaper.run(shutdown.resubscribe()));

        let components = self.components.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        spawn_supervised("config-reload", async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => components.apply(&config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for driving the gate without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn components(&self) -> &GateComponents {
        &self.components
    }

    pub fn tokens(&self) -> &Arc<TokenLifecycle> {
        &self.components.tokens
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.components.parts.limiter
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

/// Forward an admitted request to the upstream.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id_of(&request).to_string();
    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return AdmissionError::Internal(e.to_string()).into_response();
        }
    };
    parts.headers.remove(header::HOST);

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => relay(response),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            bad_gateway()
        }
    }
}

fn relay(response: hyper::Response<Incoming>) -> Response {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}

fn handle_panic(panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!(panic = %panic_message(panic.as_ref()), "Request handler panicked");
    AdmissionError::Internal("handler panicked".to_string()).into_response()
}
