//! Configuration module

pub mod settings;

pub use settings::{LoggingConfig, OrchestratorConfig, ServerConfig, ServiceConfig, Settings};
