//! AI Service Orchestrator
//!
//! A single front door for several independently managed AI backends (text
//! generation, speech, vision, recommendation, translation, scene generation)
//! with a global bound on in-flight requests, FIFO queuing of excess demand,
//! per-service rate limiting, and per-service lifecycle management.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod queue;

pub use error::{AppError, Result};

use std::sync::Arc;

use gateway::Orchestrator;

/// Application state shared across all handlers
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}
