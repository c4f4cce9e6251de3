//! HTTP request handlers

use crate::api::models::{
    ConversationResponse, HealthResponse, ServiceHealthSummary, ServiceListResponse,
    SubmitRequest, SuccessResponse,
};
use crate::backend::types::{Response, ServiceKind};
use crate::error::AppError;
use crate::queue::DispatcherPhase;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

/// Submit a request to one service kind
pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<ServiceKind>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<Response>, AppError> {
    let request = body.into_request();
    info!(service = %kind, request_id = %request.id, "Received request");

    let response = state.orchestrator.submit(kind, request).await?;

    info!(
        service = %kind,
        request_id = %response.id,
        success = response.success,
        processing_time_ms = response.processing_time_ms,
        "Request completed"
    );

    Ok(Json(response))
}

/// List all configured services with their lifecycle state
pub async fn list_services(State(state): State<Arc<AppState>>) -> Json<ServiceListResponse> {
    Json(ServiceListResponse {
        services: state.orchestrator.service_statuses(),
    })
}

/// Restart one service
pub async fn restart_service(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<ServiceKind>,
) -> Result<Json<SuccessResponse>, AppError> {
    info!(service = %kind, "Restart requested");

    state.orchestrator.restart(kind).await?;

    Ok(Json(SuccessResponse {
        success: true,
        message: format!("Service '{}' restarted successfully", kind),
    }))
}

/// Read a conversation's history
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ConversationResponse> {
    let messages = state.orchestrator.conversation_history(&id);
    Json(ConversationResponse { id, messages })
}

/// Clear a conversation's history
pub async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<SuccessResponse> {
    state.orchestrator.clear_conversation(&id);
    Json(SuccessResponse {
        success: true,
        message: format!("Conversation '{}' cleared", id),
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let statuses = state.orchestrator.service_statuses();
    let total = statuses.len();
    let ready = statuses.iter().filter(|s| s.ready).count();
    let phase = state.orchestrator.phase();

    let status = match phase {
        DispatcherPhase::Starting => "starting",
        DispatcherPhase::ShuttingDown => "shutting_down",
        DispatcherPhase::Ready if ready == total => "healthy",
        DispatcherPhase::Ready => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        phase,
        services: ServiceHealthSummary {
            total,
            ready,
            unavailable: total - ready,
        },
        admission: state.orchestrator.admission_snapshot(),
    })
}
