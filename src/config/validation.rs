//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, TTLs > 0, deadlines > 0)
//! - Validate route policies (methods, prefixes, capability codes)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::Method;

use crate::config::schema::GateConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "must be a socket address"));
    }
    if config.upstream.address.is_empty() {
        errors.push(ValidationError::new("upstream.address", "must be provided"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be positive"));
    }

    let limits = &config.rate_limit;
    if !(limits.requests_per_second.is_finite() && limits.requests_per_second > 0.0) {
        errors.push(ValidationError::new("rate_limit.requests_per_second", "must be positive"));
    }
    if limits.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be at least 1"));
    }
    if limits.idle_eviction_secs == 0 {
        errors.push(ValidationError::new("rate_limit.idle_eviction_secs", "must be positive"));
    }
    if limits.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be positive"));
    }

    if config.tokens.activation_ttl_secs == 0 {
        errors.push(ValidationError::new("tokens.activation_ttl_secs", "must be positive"));
    }
    if config.tokens.authentication_ttl_secs == 0 {
        errors.push(ValidationError::new("tokens.authentication_ttl_secs", "must be positive"));
    }

    let store = &config.identity_store;
    if store.deadline_ms == 0 {
        errors.push(ValidationError::new("identity_store.deadline_ms", "must be positive"));
    }
    if let Some(url) = &store.remote_url {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::new("identity_store.remote_url", "must be a valid URL"));
        }
    }

    for (i, route) in config.routes.iter().enumerate() {
        let field = |name: &str| format!("routes[{}].{}", i, name);

        if route.name.is_empty() {
            errors.push(ValidationError::new(field("name"), "must be provided"));
        }
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::new(field("path_prefix"), "must start with '/'"));
        }
        for method in &route.methods {
            if Method::from_bytes(method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    field("methods"),
                    format!("'{}' is not an HTTP method", method),
                ));
            }
        }
        if let Some(code) = &route.permission {
            if code.trim().is_empty() {
                errors.push(ValidationError::new(field("permission"), "must not be empty"));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GateConfig::default();
        config.rate_limit.requests_per_second = 0.0;
        config.rate_limit.burst_size = 0;
        config.tokens.authentication_ttl_secs = 0;
        config.identity_store.remote_url = Some("::nope::".to_string());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "rate_limit.requests_per_second",
                "rate_limit.burst_size",
                "tokens.authentication_ttl_secs",
                "identity_store.remote_url",
            ]
        );
    }

    #[test]
    fn test_route_validation() {
        let mut config = GateConfig::default();
        config.routes.push(RouteConfig {
            name: "bad".to_string(),
            methods: vec!["G ET".to_string()],
            path_prefix: "v1".to_string(),
            require_activated: false,
            permission: Some(" ".to_string()),
            priority: 0,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].to_string().starts_with("routes[0].path_prefix"));
    }
}
