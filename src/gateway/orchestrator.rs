//! Orchestrator tying the registry, dispatcher and event bus together
//!
//! Construct one `Orchestrator` per process and share it as
//! `Arc<Orchestrator>`; there is no global instance.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::backend::canned::CannedServiceFactory;
use crate::backend::conversation::{ChatMessage, ConversationStore};
use crate::backend::registry::{RegistrationReport, ServiceRegistry, ServiceStatus};
use crate::backend::traits::ServiceFactory;
use crate::backend::types::{Request, Response, ServiceKind};
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::events::{EventBus, OrchestratorEvent};
use crate::queue::{AdmissionSnapshot, Dispatcher, DispatcherPhase};

/// Front door for all AI service requests
pub struct Orchestrator {
    settings: Settings,
    registry: Arc<ServiceRegistry>,
    dispatcher: Dispatcher,
    conversations: Arc<ConversationStore>,
    events: EventBus,
}

impl Orchestrator {
    /// Orchestrator backed by the canned service adapters
    pub fn new(settings: Settings) -> Self {
        let conversations = Arc::new(ConversationStore::new(
            settings.orchestrator.conversation_max_length,
        ));
        let factory = Arc::new(CannedServiceFactory::new(conversations.clone()));
        Self::with_factory(settings, factory, conversations)
    }

    /// Orchestrator using a custom backend factory
    pub fn with_factory(
        settings: Settings,
        factory: Arc<dyn ServiceFactory>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        let events = EventBus::new();
        let registry = Arc::new(ServiceRegistry::new(factory, events.clone()));
        let dispatcher = Dispatcher::new(
            registry.clone(),
            events.clone(),
            settings.orchestrator.max_concurrent_requests,
            settings.orchestrator.request_timeout(),
        );

        Self {
            settings,
            registry,
            dispatcher,
            conversations,
            events,
        }
    }

    /// Start every configured service, prewarm the ready ones, then accept requests.
    ///
    /// Individual service failures are reported, not returned; the orchestrator
    /// is usable as soon as this completes.
    pub async fn initialize(&self) -> Result<RegistrationReport> {
        if self.dispatcher.phase() != DispatcherPhase::Starting {
            return Err(AppError::Internal("orchestrator already initialized".to_string()));
        }

        let report = self.registry.register_all(&self.settings.services).await;
        self.registry.prewarm_all().await;
        self.dispatcher.mark_ready();

        info!(
            ready = report.ready.len(),
            failed = report.failed.len(),
            max_concurrent = self.settings.orchestrator.max_concurrent_requests,
            "Orchestrator ready"
        );
        Ok(report)
    }

    pub async fn submit(&self, kind: ServiceKind, request: Request) -> Result<Response> {
        self.dispatcher.submit(kind, request).await
    }

    /// Submit a request to the kind its payload targets
    pub async fn submit_request(&self, request: Request) -> Result<Response> {
        let kind = request.service_kind();
        self.dispatcher.submit(kind, request).await
    }

    pub async fn restart(&self, kind: ServiceKind) -> Result<()> {
        if self.dispatcher.phase() == DispatcherPhase::ShuttingDown {
            return Err(AppError::ShuttingDown);
        }
        self.registry.restart(kind).await
    }

    /// Reject new submissions, then shut every service down
    pub async fn shutdown(&self) {
        self.dispatcher.begin_shutdown();
        self.registry.shutdown_all().await;
        info!("Orchestrator shut down");
    }

    pub fn is_available(&self, kind: ServiceKind) -> bool {
        self.registry.is_available(kind)
    }

    pub fn phase(&self) -> DispatcherPhase {
        self.dispatcher.phase()
    }

    pub fn service_statuses(&self) -> Vec<ServiceStatus> {
        self.registry.statuses()
    }

    pub fn admission_snapshot(&self) -> AdmissionSnapshot {
        self.dispatcher.admission_snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn conversation_history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        self.conversations.history(conversation_id)
    }

    pub fn clear_conversation(&self, conversation_id: &str) {
        self.conversations.clear(conversation_id);
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
