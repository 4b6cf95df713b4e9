//! Admission pipeline.
//!
//! # Data Flow
//! ```text
//! RequestContext (client address, Authorization header)
//!     → RateLimitStage        429 on denial
//!     → AuthenticateStage     401 on bad credential, sets identity
//!     → RequireActivatedStage 401 anonymous / 403 inactive
//!     → RequirePermissionStage 403 missing capability
//!     → admitted
//! ```
//!
//! # Design Decisions
//! - Stages are objects behind one trait, run in a fixed order
//! - The first rejection is terminal
//! - The builder decides the order, not the caller

pub mod error;
pub mod stages;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{Authenticator, Authorizer};
use crate::identity::Identity;
use crate::security::RateLimiter;

pub use error::AdmissionError;
pub use stages::{AuthenticateStage, RateLimitStage, RequireActivatedStage, RequirePermissionStage};

/// Outcome of a single stage.
pub type Verdict = Result<(), AdmissionError>;

/// Per-request state threaded through the stages.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_addr: Option<IpAddr>,
    pub authorization: Option<String>,
    pub identity: Identity,
}

impl RequestContext {
    pub fn new(client_addr: Option<IpAddr>, authorization: Option<String>) -> Self {
        Self {
            client_addr,
            authorization,
            identity: Identity::Anonymous,
        }
    }
}

/// One admission check.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn inspect(&self, ctx: &mut RequestContext) -> Verdict;
}

/// An ordered list of stages.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Run every stage in order, stopping at the first rejection.
    pub async fn run(&self, ctx: &mut RequestContext) -> Verdict {
        for stage in &self.stages {
            if let Err(err) = stage.inspect(ctx).await {
                tracing::debug!(stage = stage.name(), code = err.code(), "Request rejected");
                return Err(err);
            }
        }
        Ok(())
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

/// Composes a [`Pipeline`] in the fixed order
/// rate limit → authenticate → require activated → require permission.
#[derive(Default)]
pub struct PipelineBuilder {
    rate_limit: Option<Arc<dyn Stage>>,
    authenticate: Option<Arc<dyn Stage>>,
    require_activated: Option<Arc<dyn Stage>>,
    require_permission: Option<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn rate_limit(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limit = Some(Arc::new(RateLimitStage::new(limiter)));
        self
    }

    pub fn authenticate(mut self, authenticator: Arc<Authenticator>) -> Self {
        self.authenticate = Some(Arc::new(AuthenticateStage::new(authenticator)));
        self
    }

    pub fn require_activated(mut self, authorizer: Arc<Authorizer>) -> Self {
        self.require_activated = Some(Arc::new(RequireActivatedStage::new(authorizer)));
        self
    }

    /// Require capability `code`. Also requires activation.
    pub fn require_permission(
        mut self,
        authorizer: Arc<Authorizer>,
        code: impl Into<String>,
    ) -> Self {
        if self.require_activated.is_none() {
            self.require_activated = Some(Arc::new(RequireActivatedStage::new(authorizer.clone())));
        }
        self.require_permission = Some(Arc::new(RequirePermissionStage::new(authorizer, code)));
        self
    }

    pub fn build(self) -> Pipeline {
        let stages = [
            self.rate_limit,
            self.authenticate,
            self.require_activated,
            self.require_permission,
        ]
        .into_iter()
        .flatten()
        .collect();
        Pipeline { stages }
    }
}
