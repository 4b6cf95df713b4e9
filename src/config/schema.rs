//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Resource API that admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Token lifetimes.
    pub tokens: TokenConfig,

    /// Identity store connection.
    pub identity_store: IdentityStoreConfig,

    /// Per-route admission policies.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream resource API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:4000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:4000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client address.
    pub requests_per_second: f64,

    /// Burst capacity.
    pub burst_size: u32,

    /// Buckets unseen for this long are evicted.
    pub idle_eviction_secs: u64,

    /// Interval between reaper sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst_size: 4,
            idle_eviction_secs: 180,
            sweep_interval_secs: 60,
        }
    }
}

/// Token lifetimes per scope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    pub activation_ttl_secs: u64,
    pub authentication_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            activation_ttl_secs: 3 * 24 * 60 * 60,
            authentication_ttl_secs: 24 * 60 * 60,
        }
    }
}

/// Identity store connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityStoreConfig {
    /// Base URL of the identity service. When unset the in-memory store is used.
    pub remote_url: Option<String>,

    /// JSON seed for the in-memory store.
    pub seed_path: Option<String>,

    /// Deadline for every store call in milliseconds.
    pub deadline_ms: u64,
}

impl Default for IdentityStoreConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            seed_path: None,
            deadline_ms: 3000,
        }
    }
}

/// Admission policy for requests matching a method and path prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// HTTP methods to match. Empty matches any method.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Path prefix to match.
    pub path_prefix: String,

    /// Require a known, activated account.
    #[serde(default)]
    pub require_activated: bool,

    /// Capability code required. Implies `require_activated`.
    #[serde(default)]
    pub permission: Option<String>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.burst_size, 4);
        assert_eq!(config.rate_limit.idle_eviction_secs, 180);
        assert_eq!(config.tokens.authentication_ttl_secs, 86_400);
        assert_eq!(config.identity_store.deadline_ms, 3000);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_minimal_toml() {
        let config: GateConfig = toml::from_str(
            r#"
            [rate_limit]
            requests_per_second = 5.0

            [[routes]]
            name = "movies-write"
            methods = ["POST", "PATCH"]
            path_prefix = "/v1/movies"
            permission = "movies:write"
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.requests_per_second, 5.0);
        assert_eq!(config.rate_limit.burst_size, 4);
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].permission.as_deref(), Some("movies:write"));
        assert!(!config.routes[0].require_activated);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
