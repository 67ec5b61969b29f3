// ABOUTME: Executor that runs plan steps in dependency order against domain workers.
// ABOUTME: Handles session reuse, empty-reply retries, dependency context and result aggregation.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::types::{
    AgentContext, Domain, ExecutionPlan, OrchestrationResult, RoutePath, StepResult, TaskStep,
};
use super::worker::{Worker, WorkerRegistry};
use crate::config::ExecutorConfig;
use crate::error::Result;

// =============================================================================
// Execution Order
// =============================================================================

/// Order steps so each one comes after all of its dependencies.
///
/// Each pass appends every step whose dependencies are already placed, in
/// original relative order. If a pass finds nothing ready (a cycle or an
/// unresolvable reference), the remaining steps are appended as-is so the
/// result is always a permutation of the input.
pub fn execution_order(plan: &ExecutionPlan) -> Vec<&TaskStep> {
    let mut ordered: Vec<&TaskStep> = Vec::with_capacity(plan.steps.len());
    let mut placed: HashSet<&str> = HashSet::new();
    let mut remaining: Vec<&TaskStep> = plan.steps.iter().collect();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<&TaskStep>, Vec<&TaskStep>) = remaining
            .into_iter()
            .partition(|step| step.dependencies.iter().all(|dep| placed.contains(dep.as_str())));

        if ready.is_empty() {
            log::warn!(
                "[Executor] {} step(s) have unresolved dependencies, running them in plan order",
                blocked.len()
            );
            ordered.extend(blocked);
            break;
        }

        for step in &ready {
            placed.insert(step.id.as_str());
        }
        ordered.extend(ready);
        remaining = blocked;
    }

    ordered
}

// =============================================================================
// Step State Machine
// =============================================================================

/// Lifecycle of one step: `Pending → Running(n) → {Succeeded | Retrying(n) | Failed}`,
/// with `Retrying(n) → Running(n + 1)` until the attempt bound is reached.
#[derive(Debug, Clone, PartialEq)]
pub enum StepState {
    Pending,
    Running { attempt: u32 },
    Retrying { attempt: u32 },
    Succeeded { output: String },
    Failed { error: String },
}

impl StepState {
    /// State following attempt number `attempt` with the given worker outcome.
    pub fn after_attempt(attempt: u32, max_attempts: u32, outcome: Result<String>) -> StepState {
        match outcome {
            Ok(text) if !text.trim().is_empty() => StepState::Succeeded { output: text },
            Ok(_) if attempt < max_attempts => StepState::Retrying { attempt },
            Ok(_) => StepState::Failed {
                error: format!("Worker returned an empty response after {} attempts", attempt),
            },
            Err(e) => StepState::Failed {
                error: e.to_string(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Succeeded { .. } | StepState::Failed { .. })
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Drives plans (or single ad-hoc steps) against the worker registry.
pub struct Executor {
    workers: WorkerRegistry,
    max_attempts: u32,
    digest_chars: usize,
}

impl Executor {
    pub fn new(workers: WorkerRegistry, config: &ExecutorConfig) -> Self {
        Self {
            workers,
            max_attempts: config.max_attempts.max(1),
            digest_chars: config.dependency_digest_chars,
        }
    }

    /// Run every step of a validated plan, one at a time, in dependency order.
    ///
    /// A failed step never aborts the run; dependents see no context for it.
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        context: &mut AgentContext,
    ) -> OrchestrationResult {
        let started = Instant::now();
        let order = execution_order(plan);
        let total = order.len();
        let mut previous_results: HashMap<String, String> = HashMap::new();
        let mut results: Vec<StepResult> = Vec::with_capacity(total);

        for (index, step) in order.into_iter().enumerate() {
            log::info!(
                "[Executor] Running step {} ({}/{}) on {} worker: {}",
                step.id,
                index + 1,
                total,
                step.domain,
                step.action
            );

            let prompt = build_prompt(step, &previous_results, self.digest_chars);
            let result = self.execute_step(&step.id, step.domain, &prompt, context).await;

            if let Some(output) = result.output.as_ref().filter(|_| result.success) {
                previous_results.insert(step.id.clone(), output.clone());
            }
            results.push(result);
        }

        aggregate(results, elapsed_ms(started), RoutePath::Orchestrated)
    }

    /// Run the whole query as one step on a single worker.
    pub async fn execute_simple(
        &self,
        query: &str,
        domain: Domain,
        context: &mut AgentContext,
    ) -> OrchestrationResult {
        let started = Instant::now();
        log::info!("[Executor] Running simple query on {} worker", domain);

        let result = self.execute_step("step-1", domain, query, context).await;
        aggregate(vec![result], elapsed_ms(started), RoutePath::Simple { domain })
    }

    async fn execute_step(
        &self,
        step_id: &str,
        domain: Domain,
        prompt: &str,
        context: &mut AgentContext,
    ) -> StepResult {
        let started = Instant::now();

        let outcome = match self.workers.resolve(domain) {
            Ok(worker) => match session_for(worker.as_ref(), context).await {
                Ok(session) => self.run_attempts(worker.as_ref(), &session, prompt, step_id).await,
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };

        let latency_ms = elapsed_ms(started);
        match outcome {
            Ok(output) => {
                log::info!("[Executor] Step {} succeeded in {}ms", step_id, latency_ms);
                StepResult {
                    step_id: step_id.to_string(),
                    success: true,
                    output: Some(output),
                    error: None,
                    tools_called: Vec::new(),
                    latency_ms,
                }
            }
            Err(error) => {
                log::error!(
                    "[Executor] Step {} failed after {}ms: {}",
                    step_id,
                    latency_ms,
                    error
                );
                StepResult {
                    step_id: step_id.to_string(),
                    success: false,
                    output: None,
                    error: Some(error),
                    tools_called: Vec::new(),
                    latency_ms,
                }
            }
        }
    }

    /// Drive the step state machine to a terminal state: the reply on
    /// success, the error message on failure.
    async fn run_attempts(
        &self,
        worker: &dyn Worker,
        session: &str,
        prompt: &str,
        step_id: &str,
    ) -> std::result::Result<String, String> {
        let mut state = StepState::Pending;
        loop {
            state = match state {
                StepState::Pending => StepState::Running { attempt: 1 },
                StepState::Retrying { attempt } => {
                    log::warn!(
                        "[Executor] Step {} got an empty reply (attempt {}/{}), retrying",
                        step_id,
                        attempt,
                        self.max_attempts
                    );
                    StepState::Running {
                        attempt: attempt + 1,
                    }
                }
                StepState::Running { attempt } => {
                    let outcome = worker.invoke(session, prompt).await;
                    StepState::after_attempt(attempt, self.max_attempts, outcome)
                }
                StepState::Succeeded { output } => return Ok(output),
                StepState::Failed { error } => return Err(error),
            };
        }
    }
}

/// Reuse the run's thread, or create one and record it for later steps.
async fn session_for(worker: &dyn Worker, context: &mut AgentContext) -> Result<String> {
    if let Some(thread_id) = &context.thread_id {
        return Ok(thread_id.clone());
    }

    let session = worker.create_session(context).await?;
    log::debug!("[Executor] Created session {} via {}", session, worker.id());
    context.thread_id = Some(session.clone());
    Ok(session)
}

/// Step prompt: the description, preceded by a digest of each dependency's
/// output when any dependency produced one.
pub fn build_prompt(
    step: &TaskStep,
    previous_results: &HashMap<String, String>,
    digest_chars: usize,
) -> String {
    let digests: Vec<String> = step
        .dependencies
        .iter()
        .filter_map(|dep| {
            previous_results
                .get(dep)
                .map(|output| format!("- {}: {}", dep, truncate(output, digest_chars)))
        })
        .collect();

    if digests.is_empty() {
        return step.description.clone();
    }

    format!(
        "Context from previous steps:\n{}\n\n{}",
        digests.join("\n"),
        step.description
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Final response text for a set of step results.
///
/// - none succeeded: an explanatory line followed by `- <error>` per step
/// - one succeeded: its output verbatim
/// - several succeeded: `Step N: <output>` blocks separated by blank lines,
///   where N is the step's position in execution order
pub fn aggregate_response(steps: &[StepResult]) -> String {
    let successes: Vec<(usize, &str)> = steps
        .iter()
        .enumerate()
        .filter(|(_, s)| s.success)
        .filter_map(|(i, s)| s.output.as_deref().map(|out| (i + 1, out)))
        .collect();

    match successes.as_slice() {
        [] => {
            let errors: Vec<String> = steps
                .iter()
                .map(|s| format!("- {}", s.error.as_deref().unwrap_or("Unknown error")))
                .collect();
            format!(
                "I wasn't able to complete your request. The following errors occurred:\n{}",
                errors.join("\n")
            )
        }
        [(_, output)] => output.to_string(),
        many => many
            .iter()
            .map(|(n, output)| format!("Step {}: {}", n, output))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}

fn aggregate(
    steps: Vec<StepResult>,
    total_latency_ms: u64,
    route: RoutePath,
) -> OrchestrationResult {
    let success = steps.iter().any(|s| s.success);
    let final_response = aggregate_response(&steps);
    let tools_called = steps
        .iter()
        .flat_map(|s| s.tools_called.iter().cloned())
        .collect();

    log::info!(
        "[Executor] Finished {} step(s), {} succeeded, {}ms",
        steps.len(),
        steps.iter().filter(|s| s.success).count(),
        total_latency_ms
    );

    OrchestrationResult {
        success,
        final_response,
        steps,
        total_latency_ms,
        tools_called,
        route,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
