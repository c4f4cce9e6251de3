//! Service registry owning one backend instance per service kind
//!
//! The registry drives every lifecycle transition (initialize, prewarm,
//! restart, shutdown). Lifecycle operations on the same kind are serialized;
//! operations on different kinds run independently, and a failure in one kind
//! never affects the others.

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::backend::traits::{AiService, ServiceFactory};
use crate::backend::types::ServiceKind;
use crate::config::ServiceConfig;
use crate::error::{AppError, Result};
use crate::events::EventBus;

/// Lifecycle state of a service handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
    ShuttingDown,
    Shutdown,
    Restarting,
}

impl ServiceState {
    pub fn can_transition_to(&self, next: ServiceState) -> bool {
        use ServiceState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Initializing, Ready)
                | (Initializing, Failed)
                | (Ready, ShuttingDown)
                | (Ready, Restarting)
                | (Failed, ShuttingDown)
                | (Failed, Restarting)
                | (ShuttingDown, Shutdown)
                | (Restarting, Initializing)
        )
    }
}

#[derive(Debug)]
struct HandleStatus {
    state: ServiceState,
    last_error: Option<String>,
}

/// A backend instance together with its lifecycle state
pub struct ServiceHandle {
    kind: ServiceKind,
    service: Arc<dyn AiService>,
    status: RwLock<HandleStatus>,
}

impl ServiceHandle {
    fn new(kind: ServiceKind, service: Arc<dyn AiService>) -> Self {
        Self {
            kind,
            service,
            status: RwLock::new(HandleStatus {
                state: ServiceState::Uninitialized,
                last_error: None,
            }),
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn service(&self) -> Arc<dyn AiService> {
        self.service.clone()
    }

    pub fn state(&self) -> ServiceState {
        self.status.read().state
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.read().last_error.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// Apply a state transition; invalid transitions are ignored and logged
    fn transition(&self, next: ServiceState) -> bool {
        let mut status = self.status.write();
        if !status.state.can_transition_to(next) {
            warn!(
                service = %self.kind,
                from = ?status.state,
                to = ?next,
                "Ignoring invalid service state transition"
            );
            return false;
        }
        debug!(service = %self.kind, from = ?status.state, to = ?next, "Service state transition");
        status.state = next;
        true
    }

    fn fail(&self, message: String) {
        let mut status = self.status.write();
        if !status.state.can_transition_to(ServiceState::Failed) {
            warn!(
                service = %self.kind,
                from = ?status.state,
                "Ignoring failure report in current state"
            );
            return;
        }
        status.state = ServiceState::Failed;
        status.last_error = Some(message);
    }
}

/// Status snapshot reported for one configured service
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceStatus {
    pub kind: ServiceKind,
    pub name: Option<String>,
    pub state: ServiceState,
    pub ready: bool,
    pub last_error: Option<String>,
}

/// Outcome of `register_all`
#[derive(Debug, Clone, Default)]
pub struct RegistrationReport {
    pub ready: Vec<ServiceKind>,
    pub failed: Vec<(ServiceKind, String)>,
}

/// Registry for AI backend services
pub struct ServiceRegistry {
    factory: Arc<dyn ServiceFactory>,
    events: EventBus,
    handles: DashMap<ServiceKind, Arc<ServiceHandle>>,
    configs: DashMap<ServiceKind, ServiceConfig>,
    /// Errors for kinds whose backend could not even be constructed
    creation_errors: DashMap<ServiceKind, String>,
    lifecycle_locks: [Mutex<()>; ServiceKind::COUNT],
    /// Set by `shutdown_all`; no backend is started afterwards
    shutting_down: AtomicBool,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new(factory: Arc<dyn ServiceFactory>, events: EventBus) -> Self {
        Self {
            factory,
            events,
            handles: DashMap::new(),
            configs: DashMap::new(),
            creation_errors: DashMap::new(),
            lifecycle_locks: std::array::from_fn(|_| Mutex::new(())),
            shutting_down: AtomicBool::new(false),
        }
    }

    fn lifecycle_lock(&self, kind: ServiceKind) -> &Mutex<()> {
        &self.lifecycle_locks[kind as usize]
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Initialize every enabled backend concurrently.
    ///
    /// Each failure is recorded against its own kind only; this never fails
    /// as a whole.
    pub async fn register_all(&self, configs: &[ServiceConfig]) -> RegistrationReport {
        for config in configs {
            if !config.enabled {
                info!(service = %config.kind, "Skipping disabled service");
                continue;
            }
            self.configs.insert(config.kind, config.clone());
        }

        let starts = configs
            .iter()
            .filter(|c| c.enabled)
            .map(|config| async move {
                let _guard = self.lifecycle_lock(config.kind).lock().await;
                (config.kind, self.start_locked(config.clone()).await)
            });

        let mut report = RegistrationReport::default();
        for (kind, result) in join_all(starts).await {
            match result {
                Ok(()) => report.ready.push(kind),
                Err(e) => report.failed.push((kind, e.to_string())),
            }
        }

        info!(
            ready = report.ready.len(),
            failed = report.failed.len(),
            "Service registration completed"
        );
        report
    }

    /// Create, insert and initialize one backend. Caller holds the kind's lifecycle lock.
    async fn start_locked(&self, config: ServiceConfig) -> Result<()> {
        let kind = config.kind;
        if self.is_shutting_down() {
            debug!(service = %kind, "Not starting service, registry is shutting down");
            return Err(AppError::ShuttingDown);
        }

        let service = match self.factory.create(&config) {
            Ok(service) => service,
            Err(e) => {
                warn!(service = %kind, error = %e, "Failed to create service");
                self.creation_errors.insert(kind, e.to_string());
                self.events.service_status_changed(kind, false);
                return Err(AppError::Initialization {
                    kind,
                    message: e.to_string(),
                });
            }
        };
        self.creation_errors.remove(&kind);

        let handle = Arc::new(ServiceHandle::new(kind, service));
        handle.transition(ServiceState::Initializing);
        self.handles.insert(kind, handle.clone());

        info!(service = %kind, name = %handle.service.name(), "Initializing service");

        match handle.service.initialize().await {
            Ok(()) => {
                handle.transition(ServiceState::Ready);
                info!(service = %kind, "Service ready");
                self.events.service_status_changed(kind, true);
                Ok(())
            }
            Err(e) => {
                let message = match e {
                    AppError::Initialization { message, .. } => message,
                    other => other.to_string(),
                };
                warn!(service = %kind, error = %message, "Service failed to initialize");
                handle.fail(message.clone());
                self.events.service_status_changed(kind, false);
                Err(AppError::Initialization { kind, message })
            }
        }
    }

    /// Prewarm every ready service concurrently; failures are only logged.
    ///
    /// Returns the number of services that warmed up successfully.
    pub async fn prewarm_all(&self) -> usize {
        let targets: Vec<Arc<ServiceHandle>> = self
            .handles
            .iter()
            .filter(|entry| entry.value().is_ready())
            .filter(|entry| self.configs.get(entry.key()).map_or(true, |c| c.prewarm))
            .map(|entry| entry.value().clone())
            .collect();

        let warmups = targets.into_iter().map(|handle| async move {
            match handle.service.prewarm().await {
                Ok(()) => {
                    debug!(service = %handle.kind, "Service prewarmed");
                    true
                }
                Err(e) => {
                    warn!(service = %handle.kind, error = %e, "Prewarm failed");
                    false
                }
            }
        });

        let warmed = join_all(warmups).await.into_iter().filter(|ok| *ok).count();
        info!(warmed, "Prewarm completed");
        warmed
    }

    /// Replace the backend for `kind` with a freshly initialized instance.
    ///
    /// Requests already routed to the old instance may fail with
    /// `ServiceUnavailable`; other kinds are unaffected.
    pub async fn restart(&self, kind: ServiceKind) -> Result<()> {
        let _guard = self.lifecycle_lock(kind).lock().await;
        if self.is_shutting_down() {
            return Err(AppError::ShuttingDown);
        }

        let config = self
            .configs
            .get(&kind)
            .map(|c| c.value().clone())
            .ok_or(AppError::ServiceNotConfigured(kind))?;

        info!(service = %kind, "Restarting service");

        if let Some((_, old)) = self.handles.remove(&kind) {
            if old.state() != ServiceState::Shutdown {
                old.transition(ServiceState::Restarting);
                self.events.service_status_changed(kind, false);
                old.service.shutdown().await;
            }
        }

        self.start_locked(config).await
    }

    /// Shut every service down concurrently.
    ///
    /// Covers every configured kind, including one whose handle is being
    /// replaced by a restart: its lifecycle lock is awaited, so a backend
    /// started by that restart is shut down too. Restarts issued afterwards
    /// fail with `ShuttingDown`.
    pub async fn shutdown_all(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);

        let mut kinds: Vec<ServiceKind> = self.configs.iter().map(|e| *e.key()).collect();
        kinds.extend(self.handles.iter().map(|e| *e.key()));
        kinds.sort();
        kinds.dedup();

        let shutdowns = kinds.into_iter().map(|kind| async move {
            let _guard = self.lifecycle_lock(kind).lock().await;
            let handle = match self.handles.get(&kind) {
                Some(entry) => entry.value().clone(),
                None => return,
            };

            if !handle.transition(ServiceState::ShuttingDown) {
                return;
            }
            handle.service.shutdown().await;
            handle.transition(ServiceState::Shutdown);
            self.events.service_status_changed(kind, false);
        });

        join_all(shutdowns).await;
        info!("All services shut down");
    }

    /// The service for `kind` if it is ready to take requests
    pub fn resolve(&self, kind: ServiceKind) -> Option<Arc<dyn AiService>> {
        self.handles
            .get(&kind)
            .filter(|entry| entry.value().is_ready())
            .map(|entry| entry.value().service.clone())
    }

    pub fn handle(&self, kind: ServiceKind) -> Option<Arc<ServiceHandle>> {
        self.handles.get(&kind).map(|entry| entry.value().clone())
    }

    pub fn is_available(&self, kind: ServiceKind) -> bool {
        self.resolve(kind).map_or(false, |service| service.is_available())
    }

    pub fn state(&self, kind: ServiceKind) -> ServiceState {
        match self.handles.get(&kind) {
            Some(entry) => entry.value().state(),
            None if self.is_shutting_down() && self.configs.contains_key(&kind) => {
                ServiceState::Shutdown
            }
            None if self.creation_errors.contains_key(&kind) => ServiceState::Failed,
            None if self.configs.contains_key(&kind) => ServiceState::Restarting,
            None => ServiceState::Uninitialized,
        }
    }

    /// Status of every configured service, in kind order
    pub fn statuses(&self) -> Vec<ServiceStatus> {
        let mut kinds: Vec<ServiceKind> = self.configs.iter().map(|e| *e.key()).collect();
        kinds.sort();

        kinds
            .into_iter()
            .map(|kind| match self.handle(kind) {
                Some(handle) => ServiceStatus {
                    kind,
                    name: Some(handle.service.name().to_string()),
                    state: handle.state(),
                    ready: handle.is_ready(),
                    last_error: handle.last_error(),
                },
                None => ServiceStatus {
                    kind,
                    name: None,
                    state: self.state(kind),
                    ready: false,
                    last_error: self.creation_errors.get(&kind).map(|e| e.value().clone()),
                },
            })
            .collect()
    }

    pub fn ready_count(&self) -> usize {
        self.handles.iter().filter(|e| e.value().is_ready()).count()
    }

    /// Number of registered handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
