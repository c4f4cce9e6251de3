//! API request and response models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::backend::conversation::ChatMessage;
use crate::backend::registry::ServiceStatus;
use crate::backend::types::{Request, RequestPayload};
use crate::queue::{AdmissionSnapshot, DispatcherPhase};

/// Request submission body
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SubmitRequest {
    pub payload: RequestPayload,

    /// Reserved for future ordering policies
    #[serde(default = "default_priority")]
    pub priority: f32,
}

fn default_priority() -> f32 {
    1.0
}

impl SubmitRequest {
    pub fn into_request(self) -> Request {
        Request::new(self.payload).with_priority(self.priority)
    }
}

/// Service list response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceStatus>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub phase: DispatcherPhase,
    pub services: ServiceHealthSummary,
    pub admission: AdmissionSnapshot,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceHealthSummary {
    pub total: usize,
    pub ready: usize,
    pub unavailable: usize,
}

/// Conversation history response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: String,
    pub messages: Vec<ChatMessage>,
}

/// Generic success response
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}
