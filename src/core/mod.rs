//! Orchestration logic.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, RunLimits};
