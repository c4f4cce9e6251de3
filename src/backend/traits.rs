//! Capability contract every backend service implements

use async_trait::async_trait;
use std::sync::Arc;

use crate::backend::types::{Request, Response, ServiceKind};
use crate::config::ServiceConfig;
use crate::error::Result;

/// Trait for AI backend services
///
/// `process` must be callable concurrently on the same instance. The
/// registry guarantees `initialize` is never run concurrently with itself.
#[async_trait]
pub trait AiService: Send + Sync {
    /// Capability served by this backend
    fn kind(&self) -> ServiceKind;

    /// Human readable backend name
    fn name(&self) -> &str;

    /// True once initialized and not yet shut down
    fn is_available(&self) -> bool;

    /// One-time setup (credential validation, connectivity probe)
    async fn initialize(&self) -> Result<()>;

    /// Handle a single request
    async fn process(&self, request: &Request) -> Result<Response>;

    /// Best-effort warm-up; errors are logged by the caller and never propagated
    async fn prewarm(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources; afterwards `is_available` returns false
    async fn shutdown(&self);
}

/// Builds backend instances from configuration.
///
/// Called once per kind at startup and again on every restart.
pub trait ServiceFactory: Send + Sync {
    fn create(&self, config: &ServiceConfig) -> Result<Arc<dyn AiService>>;
}
