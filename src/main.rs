//! Request admission gate.
//!
//! Sits in front of a resource API and decides, per request, whether it
//! may proceed. Admitted requests are forwarded upstream with the caller's
//! account id; everything else gets a JSON error.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────┐
//!                     │                ADMISSION GATE                 │
//!   Client Request    │  ┌────────┐   ┌──────────┐   ┌────────────┐   │
//!   ──────────────────┼─▶│  http  │──▶│ routing  │──▶│  pipeline  │   │
//!                     │  │ server │   │ (policy) │   │ rate limit │   │
//!                     │  └────────┘   └──────────┘   │ authn      │   │
//!                     │                              │ authz      │   │
//!                     │                              └─────┬──────┘   │
//!                     │                   rejected ◀───────┤          │
//!                     │                                    ▼          │   Resource
//!   Client Response   │  ┌──────────┐               ┌────────────┐    │   API
//!   ◀─────────────────┼──│ response │◀──────────────│  forward   │────┼──▶
//!                     │  └──────────┘               └────────────┘    │
//!                     │                                               │
//!                     │   store · config · lifecycle · observability  │
//!                     │   security (limiter, reaper)                  │
//!                     └───────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gate::config::{load_config, watcher::ConfigWatcher, GateConfig};
use admission_gate::http::HttpServer;
use admission_gate::lifecycle::{signals::forward_termination, Shutdown};
use admission_gate::observability::{logging, metrics};
use admission_gate::store::{IdentityStore, InMemoryIdentityStore, RemoteIdentityStore};

#[derive(Parser)]
#[command(name = "admission-gate")]
#[command(about = "Request admission gate in front of a resource API", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/gate.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    if cli.check {
        println!("{}: configuration is valid", cli.config.display());
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admission-gate starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        routes = config.routes.len(),
        rate_limit_enabled = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = build_store(&config)?;

    let (watcher, config_updates) = ConfigWatcher::new(&cli.config);
    // Dropping the handle stops watching.
    let _watcher = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(forward_termination(shutdown.clone()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, store)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_store(config: &GateConfig) -> Result<Arc<dyn IdentityStore>, Box<dyn std::error::Error>> {
    let settings = &config.identity_store;
    let deadline = std::time::Duration::from_millis(settings.deadline_ms);

    if let Some(url) = &settings.remote_url {
        tracing::info!(url = %url, "Using remote identity service");
        return Ok(Arc::new(RemoteIdentityStore::new(url, deadline)?));
    }

    match &settings.seed_path {
        Some(path) => Ok(Arc::new(InMemoryIdentityStore::load_seed(Path::new(path))?)),
        None => {
            tracing::warn!("No identity store configured; every credential will be rejected");
            Ok(Arc::new(InMemoryIdentityStore::new()))
        }
    }
}
