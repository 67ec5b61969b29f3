// ABOUTME: Orchestrator service that ties classifier, router, planner and executor together.
// ABOUTME: Provides process_query() plus classify/plan introspection entry points.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::classifier;
use super::executor::Executor;
use super::gateway::{GatewayClient, GatewayGenerator};
use super::planner::{Planner, StructuredGenerator};
use super::router::{self, RoutingStats};
use super::types::{AgentContext, OrchestrationResult, PlannerOutcome, QueryClassification};
use super::validation::validate_plan;
use super::worker::WorkerRegistry;
use crate::config::OrchestratorConfig;
use crate::error::Result;

/// Classification and plan for a query, without execution.
#[derive(Debug, Clone, Serialize)]
pub struct PlanPreview {
    pub classification: QueryClassification,
    pub outcome: PlannerOutcome,
}

/// Entry point for the classify → route → plan → validate → execute pipeline.
pub struct Orchestrator {
    planner: Planner,
    executor: Executor,
}

impl Orchestrator {
    pub fn new(planner: Planner, executor: Executor) -> Self {
        Self { planner, executor }
    }

    /// Build an orchestrator whose planner and workers talk to the gateway.
    pub fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        let client = Arc::new(GatewayClient::new(&config.gateway)?);
        let generator: Arc<dyn StructuredGenerator> = Arc::new(GatewayGenerator::new(
            client,
            config.gateway.planner_model(),
        ));
        let planner = Planner::new(generator, Duration::from_secs(config.planner.timeout_secs));
        let workers = WorkerRegistry::gateway(&config.gateway)?;

        Ok(Self::new(planner, Executor::new(workers, &config.executor)))
    }

    /// Run a query end to end and fold the outcome into `stats`.
    ///
    /// Never fails: planner and step failures are recovered and reported in
    /// the returned result.
    pub async fn process_query(
        &self,
        query: &str,
        context: &mut AgentContext,
        stats: &mut RoutingStats,
    ) -> OrchestrationResult {
        let classification = self.classify_only(query);
        let primary = router::primary_domain(&classification);

        let result = if router::should_orchestrate(&classification) {
            log::info!("[Orchestrator] Route: orchestrated");
            let outcome = self.planner.plan(query, &classification).await;
            let plan = outcome.into_plan();

            let errors = validate_plan(&plan);
            if errors.is_empty() {
                self.executor.execute_plan(&plan, context).await
            } else {
                for error in &errors {
                    log::warn!("[Orchestrator] Invalid plan: {}", error);
                }
                log::warn!(
                    "[Orchestrator] Discarding plan, running simple path on {}",
                    primary
                );
                self.executor.execute_simple(query, primary, context).await
            }
        } else {
            log::info!("[Orchestrator] Route: simple ({})", primary);
            self.executor.execute_simple(query, primary, context).await
        };

        stats.record(&classification, &result);
        log::info!(
            "[Orchestrator] Query finished: success={}, steps={}, {}ms",
            result.success,
            result.steps.len(),
            result.total_latency_ms
        );

        result
    }

    /// Classification stage only.
    pub fn classify_only(&self, query: &str) -> QueryClassification {
        let classification = classifier::classify(query);
        log::info!(
            "[Orchestrator] Classification: complexity={:?}, domains={:?}, steps={}",
            classification.complexity,
            classification.domains,
            classification.estimated_steps
        );
        classification
    }

    /// Classification and planning stages, without executing anything.
    pub async fn plan_only(&self, query: &str) -> PlanPreview {
        let classification = self.classify_only(query);
        let outcome = self.planner.plan(query, &classification).await;
        PlanPreview {
            classification,
            outcome,
        }
    }
}
