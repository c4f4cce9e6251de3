//! Request dispatcher: the single entry point for typed requests
//!
//! Fast-fails requests that cannot be served, bounds in-flight work through
//! [`AdmissionControl`], and turns backend failures into failed responses so a
//! misbehaving backend cannot break admission bookkeeping.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::backend::registry::ServiceRegistry;
use crate::backend::types::{Request, Response, ServiceKind};
use crate::error::{AppError, Result};
use crate::events::EventBus;
use crate::queue::admission::{AdmissionControl, AdmissionSnapshot};

/// Whether the dispatcher accepts submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherPhase {
    Starting,
    Ready,
    ShuttingDown,
}

/// Routes requests to ready backends under a global concurrency bound
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    admission: Arc<AdmissionControl>,
    events: EventBus,
    request_timeout: Duration,
    phase: RwLock<DispatcherPhase>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        events: EventBus,
        max_concurrent: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            admission: AdmissionControl::new(max_concurrent),
            events,
            request_timeout,
            phase: RwLock::new(DispatcherPhase::Starting),
        }
    }

    pub fn phase(&self) -> DispatcherPhase {
        *self.phase.read()
    }

    /// Start accepting submissions
    pub fn mark_ready(&self) {
        let mut phase = self.phase.write();
        if *phase == DispatcherPhase::Starting {
            *phase = DispatcherPhase::Ready;
            info!("Dispatcher accepting requests");
        }
    }

    /// Reject all further submissions
    pub fn begin_shutdown(&self) {
        *self.phase.write() = DispatcherPhase::ShuttingDown;
        info!("Dispatcher rejecting new requests");
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn admission(&self) -> &Arc<AdmissionControl> {
        &self.admission
    }

    pub fn admission_snapshot(&self) -> AdmissionSnapshot {
        self.admission.snapshot()
    }

    /// Submit a request to the backend for `kind`.
    ///
    /// Errors are reserved for requests that were never processed
    /// (not initialized, shutting down, mismatched payload, service
    /// unavailable). Backend failures and timeouts come back as a `Response`
    /// with `success == false`.
    pub async fn submit(&self, kind: ServiceKind, request: Request) -> Result<Response> {
        match self.phase() {
            DispatcherPhase::Starting => return Err(AppError::NotInitialized),
            DispatcherPhase::ShuttingDown => return Err(AppError::ShuttingDown),
            DispatcherPhase::Ready => {}
        }

        if request.service_kind() != kind {
            return Err(AppError::InvalidRequest(format!(
                "Payload for {} cannot be sent to {}",
                request.service_kind(),
                kind
            )));
        }

        if self.registry.resolve(kind).is_none() {
            return Err(self.unavailable(kind, &request));
        }

        let permit = self.admission.acquire().await;
        debug!(
            service = %kind,
            request_id = %request.id,
            sequence = permit.sequence(),
            queued = permit.was_queued(),
            "Request admitted"
        );

        // The backend may have been restarted or shut down while we were queued.
        let service = match self.registry.resolve(kind) {
            Some(service) => service,
            None => {
                drop(permit);
                return Err(self.unavailable(kind, &request));
            }
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.request_timeout, service.process(&request)).await;
        drop(permit);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(AppError::ServiceUnavailable(_))) => {
                return Err(self.unavailable(kind, &request));
            }
            Ok(Err(e)) => Response::failure(request.id, e.to_string(), elapsed_ms),
            Err(_) => {
                warn!(
                    service = %kind,
                    request_id = %request.id,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Backend call exceeded request timeout"
                );
                Response::failure(
                    request.id,
                    AppError::Timeout(self.request_timeout).to_string(),
                    elapsed_ms,
                )
            }
        };

        if !response.success {
            self.events.error_occurred(format!(
                "{} request {} failed: {}",
                kind,
                request.id,
                response.error_message.as_deref().unwrap_or("unknown error")
            ));
        }
        self.events.response_received(response.clone());

        Ok(response)
    }

    fn unavailable(&self, kind: ServiceKind, request: &Request) -> AppError {
        self.events.error_occurred(format!(
            "{} request {} rejected: service unavailable",
            kind, request.id
        ));
        AppError::ServiceUnavailable(kind)
    }
}
