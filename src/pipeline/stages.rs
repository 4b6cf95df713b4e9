//! The four admission stages.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{Authenticator, Authorizer};
use crate::observability::metrics;
use crate::pipeline::{AdmissionError, RequestContext, Stage, Verdict};
use crate::security::RateLimiter;

/// Per-client token bucket check.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn inspect(&self, ctx: &mut RequestContext) -> Verdict {
        if !self.limiter.settings().enabled {
            return Ok(());
        }

        let Some(client) = ctx.client_addr else {
            return Err(AdmissionError::Internal(
                "client address unavailable".to_string(),
            ));
        };

        if self.limiter.admit(client) {
            Ok(())
        } else {
            metrics::record_rate_limited();
            tracing::info!(client = %client, "Rate limit exceeded");
            Err(AdmissionError::RateLimited)
        }
    }
}

/// Resolves the bearer credential into an identity.
pub struct AuthenticateStage {
    authenticator: Arc<Authenticator>,
}

impl AuthenticateStage {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }
}

#[async_trait]
impl Stage for AuthenticateStage {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn inspect(&self, ctx: &mut RequestContext) -> Verdict {
        ctx.identity = self
            .authenticator
            .authenticate(ctx.authorization.as_deref())
            .await?;
        Ok(())
    }
}

pub struct RequireActivatedStage {
    authorizer: Arc<Authorizer>,
}

impl RequireActivatedStage {
    pub fn new(authorizer: Arc<Authorizer>) -> Self {
        Self { authorizer }
    }
}

#[async_trait]
impl Stage for RequireActivatedStage {
    fn name(&self) -> &'static str {
        "require_activated"
    }

    async fn inspect(&self, ctx: &mut RequestContext) -> Verdict {
        self.authorizer.require_activated(&ctx.identity).map(|_| ())
    }
}

pub struct RequirePermissionStage {
    authorizer: Arc<Authorizer>,
    code: String,
}

impl RequirePermissionStage {
    pub fn new(authorizer: Arc<Authorizer>, code: impl Into<String>) -> Self {
        Self {
            authorizer,
            code: code.into(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }
}

#[async_trait]
impl Stage for RequirePermissionStage {
    fn name(&self) -> &'static str {
        "require_permission"
    }

    async fn inspect(&self, ctx: &mut RequestContext) -> Verdict {
        self.authorizer
            .require_permission(&ctx.identity, &self.code)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::security::ManualClock;

    fn limiter(enabled: bool) -> Arc<RateLimiter> {
        let settings = RateLimitConfig {
            enabled,
            burst_size: 1,
            ..RateLimitConfig::default()
        };
        Arc::new(RateLimiter::with_clock(settings, Arc::new(ManualClock::new())))
    }

    #[tokio::test]
    async fn test_missing_client_address_is_internal_when_enabled() {
        let stage = RateLimitStage::new(limiter(true));
        let mut ctx = RequestContext::new(None, None);
        let err = stage.inspect(&mut ctx).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Internal(_)));
    }

    #[tokio::test]
    async fn test_disabled_limiter_passes_without_tracking() {
        let limiter = limiter(false);
        let stage = RateLimitStage::new(limiter.clone());
        for _ in 0..5 {
            let mut ctx = RequestContext::new(None, None);
            stage.inspect(&mut ctx).await.unwrap();
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_burst_exhaustion_rejects() {
        let stage = RateLimitStage::new(limiter(true));
        let addr = Some("10.0.0.7".parse().unwrap());
        stage.inspect(&mut RequestContext::new(addr, None)).await.unwrap();
        let err = stage
            .inspect(&mut RequestContext::new(addr, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::RateLimited));
    }
}
