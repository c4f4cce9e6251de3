//! Gateway module - the orchestrator front door

pub mod orchestrator;

pub use orchestrator::Orchestrator;
