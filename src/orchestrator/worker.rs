// ABOUTME: Worker trait that all domain worker adapters implement, plus the domain registry.
// ABOUTME: Workers take a session handle and a prompt and return generated text.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::types::{AgentContext, Domain};
use crate::error::{OrchestratorError, Result};

/// A domain-bound text-generation session able to invoke domain tools.
///
/// The executor relies only on this contract and on the convention that an
/// empty (or whitespace-only) reply means "try again".
#[async_trait]
pub trait Worker: Send + Sync {
    /// Worker identifier (e.g. "document", "media")
    fn id(&self) -> &str;

    /// Domain this worker serves.
    fn domain(&self) -> Domain;

    /// Create a fresh session handle, seeded from the run context.
    async fn create_session(&self, context: &AgentContext) -> Result<String>;

    /// Send a prompt within a session and return the text reply.
    async fn invoke(&self, session: &str, prompt: &str) -> Result<String>;
}

/// Maps domains to workers.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: HashMap<Domain, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker under its own domain, replacing any previous one.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.domain(), worker);
    }

    #[must_use]
    pub fn with(mut self, worker: Arc<dyn Worker>) -> Self {
        self.register(worker);
        self
    }

    pub fn get(&self, domain: Domain) -> Option<Arc<dyn Worker>> {
        self.workers.get(&domain).cloned()
    }

    /// Worker for `domain`, falling back to the document worker when the
    /// domain has none.
    pub fn resolve(&self, domain: Domain) -> Result<Arc<dyn Worker>> {
        if let Some(worker) = self.get(domain) {
            return Ok(worker);
        }

        match self.get(Domain::Document) {
            Some(worker) => {
                log::debug!(
                    "[Orchestrator] No worker for domain {}, falling back to document worker",
                    domain
                );
                Ok(worker)
            }
            None => Err(OrchestratorError::NoWorker(domain.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
