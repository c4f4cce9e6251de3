//! Application settings and configuration management

use crate::backend::types::ServiceKind;
use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "AI_ORCHESTRATOR";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Admission control and request handling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Deadline applied to every backend `process` call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_conversation_max_length")]
    pub conversation_max_length: usize,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    30000
}

fn default_conversation_max_length() -> usize {
    20
}

impl OrchestratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_ms: default_request_timeout(),
            conversation_max_length: default_conversation_max_length(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

/// Per-service backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub kind: ServiceKind,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key, takes precedence over `api_key`
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_true")]
    pub requires_api_key: bool,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    /// Calls allowed per rate-limit window; 0 disables limiting
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_ms: u64,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Artificial latency added by canned backends
    #[serde(default)]
    pub simulated_latency_ms: u64,

    #[serde(default = "default_true")]
    pub prewarm: bool,
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_rate_limit_window() -> u64 {
    60000
}

fn default_timeout() -> u64 {
    30000
}

impl ServiceConfig {
    /// Configuration with defaults and a placeholder development key
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            enabled: true,
            api_key: Some("dev-key".to_string()),
            api_key_env: None,
            requires_api_key: true,
            endpoint: None,
            model: None,
            requests_per_minute: default_requests_per_minute(),
            rate_limit_window_ms: default_rate_limit_window(),
            timeout_ms: default_timeout(),
            simulated_latency_ms: 0,
            prewarm: true,
        }
    }

    /// Resolve the API key, preferring the environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .or_else(|| self.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/orchestrator.yaml")
    }

    /// Load settings from a specific configuration file (YAML or TOML)
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let format = if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut config_builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("orchestrator.max_concurrent_requests", 5)?
            .set_default("orchestrator.request_timeout_ms", 30000)?
            .set_default("orchestrator.conversation_max_length", 20)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?;

        if path.exists() {
            config_builder = config_builder.add_source(File::from(path).format(format));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = config_builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;

        if settings.services.is_empty() {
            settings.services = Self::default_services();
        }

        settings.validate()?;
        Ok(settings)
    }

    /// One enabled configuration for every service kind
    pub fn default_services() -> Vec<ServiceConfig> {
        ServiceKind::ALL.into_iter().map(ServiceConfig::new).collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.orchestrator.max_concurrent_requests == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "max_concurrent_requests must be at least 1".to_string(),
            )));
        }

        if self.orchestrator.request_timeout_ms == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "request_timeout_ms must be greater than 0".to_string(),
            )));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.kind) {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Service '{}' is configured more than once",
                    service.kind
                ))));
            }
            if service.requests_per_minute > 0 && service.rate_limit_window_ms == 0 {
                return Err(AppError::Config(config::ConfigError::Message(format!(
                    "Service '{}' has a rate limit but a zero-length window",
                    service.kind
                ))));
            }
        }

        Ok(())
    }

    /// Get the configuration for one service kind
    pub fn service(&self, kind: ServiceKind) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.kind == kind)
    }

    /// Get enabled services
    pub fn enabled_services(&self) -> Vec<&ServiceConfig> {
        self.services.iter().filter(|s| s.enabled).collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            orchestrator: OrchestratorConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            services: Self::default_services(),
        }
    }
}
