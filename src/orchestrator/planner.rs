// ABOUTME: Planner that asks a structured-generation collaborator to decompose a query into steps.
// ABOUTME: Never fails: generation errors, timeouts and malformed replies yield a single-step fallback plan.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::router::primary_domain;
use super::types::{Complexity, ExecutionPlan, PlannerOutcome, QueryClassification, TaskStep};
use crate::error::{OrchestratorError, Result};

/// External collaborator that returns JSON conforming to a schema.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate_structured(
        &self,
        system_instruction: &str,
        user_instruction: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value>;
}

const SYSTEM_INSTRUCTION: &str = "You are a task planner for a multi-domain assistant. \
Break the user's request into an ordered list of atomic steps.

Available domains:
- document: search, read, summarize and edit documents, reports and filings
- media: look up videos, images, music and podcasts
- task: create, update and query tasks, to-dos and reminders
- event: query and manage calendar events and meetings
- web: search the web for current or public information

Rules:
1. Each step targets exactly one domain and performs exactly one action.
2. Give every step a unique id (\"step-1\", \"step-2\", ...).
3. List in `dependencies` the ids of earlier steps whose output this step needs. \
A step never depends on itself.
4. `description` is the full instruction sent to the domain worker; make it self-contained.
5. Use as few steps as the request allows.

Respond with JSON only: {\"steps\": [...], \"reasoning\": \"...\"}";

/// JSON schema for `{steps: TaskStep[], reasoning: string}`.
pub fn plan_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "domain": {
                            "type": "string",
                            "enum": ["document", "media", "task", "event", "web", "general"]
                        },
                        "action": { "type": "string" },
                        "description": { "type": "string" },
                        "dependencies": {
                            "type": "array",
                            "items": { "type": "string" }
                        },
                        "args": { "type": "object" }
                    },
                    "required": ["id", "domain", "action", "description", "dependencies"]
                }
            },
            "reasoning": { "type": "string" }
        },
        "required": ["steps", "reasoning"]
    })
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    steps: Vec<TaskStep>,
    #[serde(default)]
    reasoning: String,
}

/// Decomposes complex queries into an `ExecutionPlan`.
pub struct Planner {
    generator: Arc<dyn StructuredGenerator>,
    timeout: Duration,
}

impl Planner {
    pub fn new(generator: Arc<dyn StructuredGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Plan a query. Always returns a usable plan.
    pub async fn plan(&self, query: &str, classification: &QueryClassification) -> PlannerOutcome {
        match self.generate(query, classification).await {
            Ok(plan) => {
                log::info!(
                    "[Planner] Planned {} step(s): {}",
                    plan.steps.len(),
                    plan.reasoning
                );
                PlannerOutcome::Planned { plan }
            }
            Err(e) => {
                let reason = e.to_string();
                log::warn!("[Planner] Falling back to single-step plan: {}", reason);
                PlannerOutcome::Fallback {
                    plan: fallback_plan(query, classification),
                    reason,
                }
            }
        }
    }

    async fn generate(
        &self,
        query: &str,
        classification: &QueryClassification,
    ) -> Result<ExecutionPlan> {
        let user_instruction = build_user_instruction(query, classification);
        let schema = plan_schema();

        let call = self
            .generator
            .generate_structured(SYSTEM_INSTRUCTION, &user_instruction, &schema);
        let value = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| OrchestratorError::Timeout(self.timeout.as_secs()))??;

        let response: PlanResponse = serde_json::from_value(value)?;
        if response.steps.is_empty() {
            return Err(OrchestratorError::Parse(
                "generator returned no steps".to_string(),
            ));
        }

        Ok(ExecutionPlan {
            estimated_steps: response.steps.len() as u32,
            steps: response.steps,
            complexity: classification.complexity,
            requires_orchestration: true,
            reasoning: response.reasoning,
        })
    }
}

/// Query plus a summary of its classification.
fn build_user_instruction(query: &str, classification: &QueryClassification) -> String {
    let domains: Vec<&str> = classification.domains.iter().map(|d| d.as_str()).collect();
    format!(
        "Request: {}\n\nClassification:\n- complexity: {:?}\n- domains: {}\n- requires workflow: {}\n- requires multiple tools: {}\n- estimated steps: {}",
        query,
        classification.complexity,
        domains.join(", "),
        classification.requires_workflow,
        classification.requires_multiple_tools,
        classification.estimated_steps,
    )
}

/// Degraded plan: the whole query as one step on the primary domain.
pub fn fallback_plan(query: &str, classification: &QueryClassification) -> ExecutionPlan {
    ExecutionPlan {
        steps: vec![TaskStep::new(
            "step-1",
            primary_domain(classification),
            "execute",
            query,
        )],
        complexity: Complexity::Simple,
        requires_orchestration: false,
        estimated_steps: 1,
        reasoning: String::new(),
    }
}
