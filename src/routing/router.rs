//! Admission policy lookup.
//!
//! # Responsibilities
//! - Compile `RouteConfig`s into matcher + pipeline pairs
//! - Select the pipeline for a request
//! - Fall back to the open pipeline (rate limit + authenticate)
//!
//! # Design Decisions
//! - Immutable after construction; reloads build a new router
//! - Higher priority first, then longer prefix, then declaration order
//! - O(n) scan over routes

use std::sync::Arc;

use axum::http::Method;

use crate::auth::{Authenticator, Authorizer};
use crate::config::RouteConfig;
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::routing::matcher::{AndMatcher, Matcher, MethodMatcher, PathPrefixMatcher};
use crate::security::RateLimiter;

/// Shared components every pipeline draws on.
#[derive(Clone)]
pub struct PipelineParts {
    pub limiter: Arc<RateLimiter>,
    pub authenticator: Arc<Authenticator>,
    pub authorizer: Arc<Authorizer>,
}

impl PipelineParts {
    /// The pipeline every route starts from.
    fn open(&self) -> PipelineBuilder {
        Pipeline::builder()
            .rate_limit(self.limiter.clone())
            .authenticate(self.authenticator.clone())
    }

    fn for_route(&self, route: &RouteConfig) -> Pipeline {
        let mut builder = self.open();
        if route.require_activated {
            builder = builder.require_activated(self.authorizer.clone());
        }
        if let Some(code) = &route.permission {
            builder = builder.require_permission(self.authorizer.clone(), code.as_str());
        }
        builder.build()
    }
}

struct CompiledRoute {
    name: String,
    matcher: AndMatcher,
    pipeline: Arc<Pipeline>,
}

/// A selected policy.
pub struct RouteMatch<'a> {
    /// Matched route name, or `"default"`.
    pub name: &'a str,
    pub pipeline: &'a Arc<Pipeline>,
}

pub struct PolicyRouter {
    routes: Vec<CompiledRoute>,
    default: Arc<Pipeline>,
}

impl PolicyRouter {
    pub fn new(configs: &[RouteConfig], parts: &PipelineParts) -> Self {
        let mut ordered: Vec<&RouteConfig> = configs.iter().collect();
        // Stable sort keeps declaration order among equals.
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.path_prefix.len().cmp(&a.path_prefix.len()))
        });

        let routes = ordered
            .into_iter()
            .map(|route| {
                let matchers: Vec<Box<dyn Matcher>> = vec![
                    Box::new(MethodMatcher::new(&route.methods)),
                    Box::new(PathPrefixMatcher::new(route.path_prefix.as_str())),
                ];
                let pipeline = Arc::new(parts.for_route(route));
                tracing::debug!(
                    route = %route.name,
                    stages = ?pipeline.stage_names(),
                    "Compiled route policy"
                );
                CompiledRoute {
                    name: route.name.clone(),
                    matcher: AndMatcher::new(matchers),
                    pipeline,
                }
            })
            .collect();

        Self {
            routes,
            default: Arc::new(parts.open().build()),
        }
    }

    pub fn select(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        self.routes
            .iter()
            .find(|r| r.matcher.matches(method, path))
            .map(|r| RouteMatch {
                name: r.name.as_str(),
                pipeline: &r.pipeline,
            })
            .unwrap_or(RouteMatch {
                name: "default",
                pipeline: &self.default,
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenLifecycle;
    use crate::config::{RateLimitConfig, TokenConfig};
    use crate::store::InMemoryIdentityStore;

    fn parts() -> PipelineParts {
        let store = Arc::new(InMemoryIdentityStore::new());
        let tokens = Arc::new(TokenLifecycle::new(store.clone(), TokenConfig::default()));
        PipelineParts {
            limiter: Arc::new(RateLimiter::new(RateLimitConfig::default())),
            authenticator: Arc::new(Authenticator::new(tokens)),
            authorizer: Arc::new(Authorizer::new(store)),
        }
    }

    fn route(
        name: &str,
        methods: &[&str],
        prefix: &str,
        permission: Option<&str>,
        priority: u32,
    ) -> RouteConfig {
        RouteConfig {
            name: name.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            path_prefix: prefix.to_string(),
            require_activated: false,
            permission: permission.map(str::to_string),
            priority,
        }
    }

    #[test]
    fn test_unmatched_falls_back_to_default() {
        let router = PolicyRouter::new(&[], &parts());
        let selected = router.select(&Method::GET, "/v1/healthcheck");
        assert_eq!(selected.name, "default");
        assert_eq!(selected.pipeline.stage_names(), vec!["rate_limit", "authenticate"]);
    }

    #[test]
    fn test_permission_route_builds_full_pipeline() {
        let routes = vec![route("movies-write", &["POST"], "/v1/movies", Some("movies:write"), 0)];
        let router = PolicyRouter::new(&routes, &parts());

        let selected = router.select(&Method::POST, "/v1/movies");
        assert_eq!(selected.name, "movies-write");
        assert_eq!(
            selected.pipeline.stage_names(),
            vec!["rate_limit", "authenticate", "require_activated", "require_permission"]
        );
        assert_eq!(router.select(&Method::GET, "/v1/movies").name, "default");
    }

    #[test]
    fn test_priority_then_specificity() {
        let routes = vec![
            route("broad", &[], "/v1", None, 0),
            route("narrow", &[], "/v1/movies", None, 0),
            route("urgent", &[], "/v1", None, 10),
        ];
        let router = PolicyRouter::new(&routes, &parts());
        assert_eq!(router.select(&Method::GET, "/v1/movies/1").name, "urgent");

        let routes = vec![
            route("broad", &[], "/v1", None, 0),
            route("narrow", &[], "/v1/movies", None, 0),
        ];
        let router = PolicyRouter::new(&routes, &parts());
        assert_eq!(router.select(&Method::GET, "/v1/movies/1").name, "narrow");
        assert_eq!(router.select(&Method::GET, "/v1/users").name, "broad");
    }
}
