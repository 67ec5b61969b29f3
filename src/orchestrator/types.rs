// ABOUTME: Core types for the orchestrator: classifications, plans, step results and run context.
// ABOUTME: Defines the data structures that flow between classifier, planner, router and executor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of worker/capability a step or classification targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Document,
    Media,
    Task,
    Event,
    Web,
    General,
}

impl Domain {
    /// Specialized domains in detection priority order.
    pub const SPECIALIZED: [Domain; 5] = [
        Domain::Document,
        Domain::Media,
        Domain::Task,
        Domain::Event,
        Domain::Web,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Document => "document",
            Domain::Media => "media",
            Domain::Task => "task",
            Domain::Event => "event",
            Domain::Web => "web",
            Domain::General => "general",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Complex,
}

/// Query classification produced by the classifier. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryClassification {
    pub complexity: Complexity,
    /// Non-empty; `[General]` when no domain keyword matched.
    pub domains: Vec<Domain>,
    pub requires_multiple_tools: bool,
    pub requires_workflow: bool,
    /// Heuristic, not an execution guarantee.
    pub estimated_steps: u32,
    /// Which classification rule fired. Observability only.
    pub reasoning: String,
}

/// An execution unit inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStep {
    pub id: String,
    pub domain: Domain,
    pub action: String,
    /// Sent verbatim to the worker unless dependency context is prepended.
    pub description: String,
    /// Ids of steps that must have attempted to run before this one.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Reserved for structured dispatch; the executor ignores it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TaskStep {
    pub fn new(
        id: impl Into<String>,
        domain: Domain,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            domain,
            action: action.into(),
            description: description.into(),
            dependencies: Vec::new(),
            args: None,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// An ordered, dependency-annotated set of steps for one query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    pub steps: Vec<TaskStep>,
    pub complexity: Complexity,
    pub requires_orchestration: bool,
    pub estimated_steps: u32,
    #[serde(default)]
    pub reasoning: String,
}

/// What the planner produced: a generated plan, or the degraded single-step
/// plan together with the reason generation failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerOutcome {
    Planned { plan: ExecutionPlan },
    Fallback { plan: ExecutionPlan, reason: String },
}

impl PlannerOutcome {
    pub fn plan(&self) -> &ExecutionPlan {
        match self {
            PlannerOutcome::Planned { plan } | PlannerOutcome::Fallback { plan, .. } => plan,
        }
    }

    pub fn into_plan(self) -> ExecutionPlan {
        match self {
            PlannerOutcome::Planned { plan } | PlannerOutcome::Fallback { plan, .. } => plan,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlannerOutcome::Fallback { .. })
    }
}

/// Output of running one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Reserved for tool instrumentation; always empty today.
    pub tools_called: Vec<String>,
    pub latency_ms: u64,
}

/// Which execution path served a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoutePath {
    Simple { domain: Domain },
    Orchestrated,
}

/// Top-level result of one orchestration request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestrationResult {
    /// True iff at least one step succeeded.
    pub success: bool,
    pub final_response: String,
    /// In execution order.
    pub steps: Vec<StepResult>,
    pub total_latency_ms: u64,
    pub tools_called: Vec<String>,
    pub route: RoutePath,
}

/// One prior conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Mutable carrier threaded through a single orchestration run.
///
/// `thread_id` is written at most once, by the first step that runs without
/// one, and reused by every later step so they share conversational memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentContext {
    pub user_id: Option<String>,
    pub thread_id: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

impl AgentContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}
