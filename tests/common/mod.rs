//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{any, delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use admission_gate::config::GateConfig;
use admission_gate::http::{GateComponents, HttpServer};
use admission_gate::identity::{AccountId, Scope};
use admission_gate::lifecycle::Shutdown;
use admission_gate::store::IdentityStore;

/// Bind `router` on an ephemeral port and serve it in the background.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Upstream that echoes the path and forwarded account id as JSON.
pub async fn start_echo_upstream() -> SocketAddr {
    async fn echo(headers: HeaderMap, uri: axum::http::Uri) -> Json<Value> {
        let account = headers
            .get("x-account-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Json(json!({ "path": uri.path(), "account_id": account }))
    }
    serve(Router::new().route("/", any(echo)).route("/{*path}", any(echo))).await
}

/// A running gate plus the handles a test needs.
pub struct Gate {
    pub addr: SocketAddr,
    pub components: GateComponents,
    pub shutdown: Shutdown,
    pub config_tx: mpsc::UnboundedSender<GateConfig>,
}

impl Gate {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Issue an authentication token through the running gate's store.
    pub async fn bearer(&self, account: i64) -> String {
        let token = self
            .components
            .tokens
            .issue_for_scope(AccountId(account), Scope::Authentication)
            .await
            .unwrap();
        format!("Bearer {}", token.plaintext)
    }
}

/// Start a gate in front of `config.upstream` using `store`.
pub async fn start_gate(mut config: GateConfig, store: Arc<dyn IdentityStore>) -> Gate {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let server = HttpServer::new(config, store).unwrap();
    let components = server.components().clone();

    let shutdown = Shutdown::new();
    let (config_tx, config_updates) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    Gate {
        addr,
        components,
        shutdown,
        config_tx,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// In-process identity service speaking the remote store wire contract.
#[derive(Default)]
pub struct IdentityService {
    pub accounts: Mutex<HashMap<i64, bool>>,
    pub capabilities: Mutex<HashMap<i64, HashSet<String>>>,
    /// (scope, hash) → (account id, expiry)
    pub tokens: Mutex<HashMap<(String, String), (i64, String)>>,
    pub fail_with: Mutex<Option<StatusCode>>,
}

type Shared = Arc<IdentityService>;

impl IdentityService {
    fn failure(&self) -> Option<StatusCode> {
        *self.fail_with.lock().unwrap()
    }
}

async fn find_token(
    State(svc): State<Shared>,
    Path((scope, hash)): Path<(String, String)>,
) -> impl IntoResponse {
    if let Some(status) = svc.failure() {
        return status.into_response();
    }
    let found = svc.tokens.lock().unwrap().get(&(scope, hash)).cloned();
    match found {
        Some((id, expiry)) => {
            let activated = svc.accounts.lock().unwrap().get(&id).copied().unwrap_or(false);
            Json(json!({ "account": { "id": id, "activated": activated }, "expiry": expiry }))
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn find_capabilities(State(svc): State<Shared>, Path(id): Path<i64>) -> impl IntoResponse {
    if let Some(status) = svc.failure() {
        return status.into_response();
    }
    let codes: Vec<String> = svc
        .capabilities
        .lock()
        .unwrap()
        .get(&id)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    Json(codes).into_response()
}

async fn insert_token(State(svc): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    if let Some(status) = svc.failure() {
        return status.into_response();
    }
    let key = (
        body["scope"].as_str().unwrap_or_default().to_string(),
        body["hash"].as_str().unwrap_or_default().to_string(),
    );
    let value = (
        body["account_id"].as_i64().unwrap_or_default(),
        body["expiry"].as_str().unwrap_or_default().to_string(),
    );
    svc.tokens.lock().unwrap().insert(key, value);
    StatusCode::CREATED.into_response()
}

async fn delete_tokens(
    State(svc): State<Shared>,
    Path((id, scope)): Path<(i64, String)>,
) -> impl IntoResponse {
    if let Some(status) = svc.failure() {
        return status.into_response();
    }
    svc.tokens
        .lock()
        .unwrap()
        .retain(|(s, _), (owner, _)| !(s == &scope && *owner == id));
    StatusCode::NO_CONTENT.into_response()
}

/// Start the identity service; the base URL is `http://{addr}/v1`.
pub async fn start_identity_service() -> (SocketAddr, Shared) {
    let svc: Shared = Arc::new(IdentityService::default());
    let router = Router::new()
        .route("/v1/tokens", post(insert_token))
        .route("/v1/tokens/{scope}/{hash}", get(find_token))
        .route("/v1/accounts/{id}/capabilities", get(find_capabilities))
        .route("/v1/accounts/{id}/tokens/{scope}", delete(delete_tokens))
        .with_state(svc.clone());
    (serve(router).await, svc)
}
