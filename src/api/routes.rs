//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::*;
use crate::backend::conversation::{ChatMessage, Role};
use crate::backend::registry::{ServiceState, ServiceStatus};
use crate::backend::types::{
    Recommendation, RequestPayload, Response, ResponsePayload, ServiceKind,
};
use crate::queue::{AdmissionSnapshot, DispatcherPhase};
use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "AI Service Orchestrator API",
        description = "Single front door for text, speech, vision, recommendation, translation and scene generation services.",
        license(name = "MIT"),
    ),
    components(schemas(
        SubmitRequest,
        ServiceListResponse,
        HealthResponse,
        ServiceHealthSummary,
        ConversationResponse,
        SuccessResponse,
        ServiceKind,
        ServiceState,
        ServiceStatus,
        RequestPayload,
        Response,
        ResponsePayload,
        Recommendation,
        ChatMessage,
        Role,
        AdmissionSnapshot,
        DispatcherPhase,
    )),
    tags(
        (name = "Requests", description = "Request submission"),
        (name = "Services", description = "Service lifecycle management"),
        (name = "Conversations", description = "Conversation history"),
        (name = "Health", description = "Health and monitoring endpoints"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the main application router
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let api_routes = Router::new()
        .route("/services", get(handlers::list_services))
        .route("/services/:kind/restart", post(handlers::restart_service))
        .route("/services/:kind/requests", post(handlers::submit_request))
        .route(
            "/conversations/:id",
            get(handlers::get_conversation).delete(handlers::clear_conversation),
        );

    Router::new()
        // Health check endpoint
        .route("/health", get(handlers::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        // API routes under /v1 prefix
        .nest("/v1", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
