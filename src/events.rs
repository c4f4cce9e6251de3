//! Observability events published by the registry and dispatcher

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::types::{Response, ServiceKind};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Event emitted for external consumers (presentation layer, logging)
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    ServiceStatusChanged { kind: ServiceKind, ready: bool },
    ResponseReceived(Response),
    ErrorOccurred { message: String },
}

/// Fan-out channel for orchestrator events.
///
/// Publishing never fails: with no subscribers the event is only logged, and a
/// subscriber that falls behind loses the oldest events instead of blocking
/// the publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish(&self, event: OrchestratorEvent) {
        match &event {
            OrchestratorEvent::ServiceStatusChanged { kind, ready } => {
                info!(service = %kind, ready = *ready, "Service status changed");
            }
            OrchestratorEvent::ResponseReceived(response) => {
                debug!(
                    request_id = %response.id,
                    success = response.success,
                    processing_time_ms = response.processing_time_ms,
                    "Response received"
                );
            }
            OrchestratorEvent::ErrorOccurred { message } => {
                warn!(error = %message, "Error occurred");
            }
        }

        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn service_status_changed(&self, kind: ServiceKind, ready: bool) {
        self.publish(OrchestratorEvent::ServiceStatusChanged { kind, ready });
    }

    pub fn response_received(&self, response: Response) {
        self.publish(OrchestratorEvent::ResponseReceived(response));
    }

    pub fn error_occurred(&self, message: impl Into<String>) {
        self.publish(OrchestratorEvent::ErrorOccurred {
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
