// ABOUTME: Core library for the hybrid query orchestrator.
// ABOUTME: Exposes configuration, errors and the orchestration pipeline.

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use orchestrator::router::RoutingStats;
pub use orchestrator::service::{Orchestrator, PlanPreview};
pub use orchestrator::types::{AgentContext, OrchestrationResult, QueryClassification};
