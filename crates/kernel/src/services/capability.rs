//! Organization entitlements.

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::content::block_types::Capabilities;
use crate::error::{AppError, AppResult};

#[async_trait]
pub trait CapabilityResolver: Send + Sync {
    /// Capability keys granted to an organization.
    async fn capabilities(&self, organization_id: Uuid) -> AppResult<Capabilities>;
}

/// Resolve capabilities, reporting a failed lookup as transient.
///
/// Only a successful empty answer reaches the registry's fail-open policy.
pub async fn resolve(
    resolver: &dyn CapabilityResolver,
    organization_id: Uuid,
) -> AppResult<Capabilities> {
    resolver.capabilities(organization_id).await.map_err(|e| {
        warn!(organization_id = %organization_id, error = %e, "capability lookup failed");
        match e {
            AppError::Transient(message) => AppError::Transient(message),
            other => AppError::Transient(format!("capability lookup failed: {other}")),
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct Failing(fn() -> AppError);

    #[async_trait]
    impl CapabilityResolver for Failing {
        async fn capabilities(&self, _organization_id: Uuid) -> AppResult<Capabilities> {
            Err((self.0)())
        }
    }

    #[tokio::test]
    async fn lookup_failure_is_transient() {
        let resolver = Failing(|| AppError::Transient("entitlements down".to_string()));
        let err = resolve(&resolver, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::Transient(ref m) if m == "entitlements down"));

        let resolver = Failing(|| AppError::not_found("organization"));
        let err = resolve(&resolver, Uuid::now_v7()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
