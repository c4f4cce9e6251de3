//! Main entry point for the AI Service Orchestrator

use ai_service_orchestrator::{api, config::Settings, gateway::Orchestrator, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    if settings.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    info!(
        "Starting AI Service Orchestrator: server={}:{}, services={}",
        settings.server.host,
        settings.server.port,
        settings.enabled_services().len()
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let orchestrator = Arc::new(Orchestrator::new(settings));

    // Per-service failures are logged and evented by the registry.
    orchestrator.initialize().await?;

    let app_state = Arc::new(AppState {
        orchestrator: orchestrator.clone(),
    });
    let app = api::routes::create_router(app_state);

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    orchestrator.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
