//! Unit tests for configuration loading and validation

use ai_service_orchestrator::backend::ServiceKind;
use ai_service_orchestrator::config::{ServiceConfig, Settings};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.orchestrator.max_concurrent_requests, 5);
    assert_eq!(settings.orchestrator.request_timeout(), Duration::from_secs(30));
    assert_eq!(settings.orchestrator.conversation_max_length, 20);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut settings = Settings::default();
    settings.server.port = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.orchestrator.max_concurrent_requests = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.orchestrator.request_timeout_ms = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::default();
    settings.services = vec![
        ServiceConfig::new(ServiceKind::Vision),
        ServiceConfig::new(ServiceKind::Vision),
    ];
    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("more than once"));

    let mut settings = Settings::default();
    let mut speech = ServiceConfig::new(ServiceKind::Speech);
    speech.rate_limit_window_ms = 0;
    settings.services = vec![speech];
    assert!(settings.validate().is_err());
}

#[test]
fn test_load_yaml_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .unwrap();
    write!(
        file,
        r#"
server:
  host: "127.0.0.1"
  port: 9100
orchestrator:
  max_concurrent_requests: 8
services:
  - kind: text_generation
    model: gpt-4o-mini
    requests_per_minute: 30
  - kind: translation
    enabled: false
"#
    )
    .unwrap();

    let settings = Settings::load_from_path(file.path()).unwrap();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 9100);
    assert_eq!(settings.orchestrator.max_concurrent_requests, 8);
    assert_eq!(settings.orchestrator.request_timeout_ms, 30000);
    assert_eq!(settings.services.len(), 2);

    let text = settings.service(ServiceKind::TextGeneration).unwrap();
    assert_eq!(text.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(text.requests_per_minute, 30);
    assert_eq!(text.rate_limit_window(), Duration::from_secs(60));
    assert!(text.enabled);
    assert!(text.prewarm);

    assert_eq!(settings.enabled_services().len(), 1);
    assert!(settings.service(ServiceKind::Vision).is_none());
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    let settings = Settings::load_from_path("does/not/exist.yaml").unwrap();
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.services.len(), ServiceKind::COUNT);
    assert_eq!(settings.enabled_services().len(), ServiceKind::COUNT);
}

#[test]
fn test_api_key_resolution() {
    let mut config = ServiceConfig::new(ServiceKind::Vision);
    assert_eq!(config.resolve_api_key().as_deref(), Some("dev-key"));

    config.api_key = Some("   ".to_string());
    assert!(config.resolve_api_key().is_none());

    std::env::set_var("ORCHESTRATOR_TEST_VISION_KEY", "from-env");
    config.api_key_env = Some("ORCHESTRATOR_TEST_VISION_KEY".to_string());
    assert_eq!(config.resolve_api_key().as_deref(), Some("from-env"));
    std::env::remove_var("ORCHESTRATOR_TEST_VISION_KEY");
}
