//! HTTP API tests driving the router directly

use ai_service_orchestrator::api::routes::create_router;
use ai_service_orchestrator::backend::ServiceKind;
use ai_service_orchestrator::config::Settings;
use ai_service_orchestrator::gateway::Orchestrator;
use ai_service_orchestrator::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app_with(settings: Settings) -> Router {
    let orchestrator = Arc::new(Orchestrator::new(settings));
    orchestrator.initialize().await.unwrap();
    create_router(Arc::new(AppState { orchestrator }))
}

async fn app() -> Router {
    app_with(Settings::default()).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(app().await, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["phase"], "ready");
    assert_eq!(body["services"]["total"], 6);
    assert_eq!(body["admission"]["max_concurrent"], 5);
}

#[tokio::test]
async fn test_health_reports_degraded_service() {
    let mut settings = Settings::default();
    settings.services[0].api_key = Some("invalid-key".to_string());

    let (status, body) = send(app_with(settings).await, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["unavailable"], 1);
}

#[tokio::test]
async fn test_submit_translation() {
    let request = post_json(
        "/v1/services/translation/requests",
        json!({
            "payload": {
                "type": "translation",
                "text": "good morning",
                "target_language": "pt"
            }
        }),
    );

    let (status, body) = send(app().await, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["payload"]["text"], "[pt] good morning");
}

#[tokio::test]
async fn test_unknown_service_kind_is_bad_request() {
    let request = post_json(
        "/v1/services/teleportation/requests",
        json!({ "payload": { "type": "translation", "text": "hi", "target_language": "pt" } }),
    );

    let (status, _) = send(app().await, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mismatched_payload_is_bad_request() {
    let request = post_json(
        "/v1/services/vision/requests",
        json!({ "payload": { "type": "translation", "text": "hi", "target_language": "pt" } }),
    );

    let (status, body) = send(app().await, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_unavailable_service_returns_503() {
    let mut settings = Settings::default();
    settings.services[0].api_key = Some("invalid-key".to_string());

    let request = post_json(
        "/v1/services/text_generation/requests",
        json!({ "payload": { "type": "text_generation", "prompt": "Hello" } }),
    );

    let (status, body) = send(app_with(settings).await, request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["message"], "Service unavailable: text_generation");
}

#[tokio::test]
async fn test_list_services() {
    let (status, body) = send(app().await, get("/v1/services")).await;
    assert_eq!(status, StatusCode::OK);

    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), ServiceKind::COUNT);
    assert!(services.iter().all(|s| s["state"] == "ready"));
    assert_eq!(services[0]["kind"], "text_generation");
}

#[tokio::test]
async fn test_restart_service() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/services/speech/restart")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(app().await, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_conversation_endpoints() {
    let app = app().await;

    let request = post_json(
        "/v1/services/text_generation/requests",
        json!({
            "payload": {
                "type": "text_generation",
                "prompt": "Plan a weekend",
                "conversation_id": "trip-42"
            }
        }),
    );
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payload"]["turns"], 2);

    let (status, body) = send(app.clone(), get("/v1/conversations/trip-42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["role"], "user");

    let delete = Request::builder()
        .method("DELETE")
        .uri("/v1/conversations/trip-42")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app.clone(), delete).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(app, get("/v1/conversations/trip-42")).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_openapi_document() {
    let (status, body) = send(app().await, get("/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["components"]["schemas"]["RequestPayload"].is_object());
}
