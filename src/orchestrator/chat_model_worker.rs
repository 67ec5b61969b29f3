// ABOUTME: Chat model worker adapter that calls the gateway for one domain.
// ABOUTME: Keeps per-thread conversation history in a store shared by all domain workers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::gateway::{ChatCompletion, GatewayClient};
use super::types::{AgentContext, ChatMessage, Domain};
use super::worker::{Worker, WorkerRegistry};
use crate::config::GatewayConfig;
use crate::error::Result;

/// In-memory conversation history keyed by thread id.
///
/// Threads live until `remove` is called; long-running embedders should drop
/// a thread once its conversation is over.
#[derive(Clone, Default)]
pub struct SessionStore {
    threads: Arc<Mutex<HashMap<String, Vec<ChatMessage>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new thread seeded with `history` and return its id.
    pub async fn create(&self, history: &[ChatMessage]) -> String {
        let thread_id = uuid::Uuid::new_v4().to_string();
        self.threads
            .lock()
            .await
            .insert(thread_id.clone(), history.to_vec());
        thread_id
    }

    /// Messages in a thread, or `None` if the thread is unknown.
    pub async fn messages(&self, thread_id: &str) -> Option<Vec<ChatMessage>> {
        self.threads.lock().await.get(thread_id).cloned()
    }

    /// Record one user/assistant exchange. Unknown threads are created.
    pub async fn append_exchange(&self, thread_id: &str, prompt: &str, reply: &str) {
        let mut threads = self.threads.lock().await;
        let thread = threads.entry(thread_id.to_string()).or_default();
        thread.push(ChatMessage::user(prompt));
        thread.push(ChatMessage::assistant(reply));
    }

    /// Forget a thread. Returns its messages if it existed.
    pub async fn remove(&self, thread_id: &str) -> Option<Vec<ChatMessage>> {
        self.threads.lock().await.remove(thread_id)
    }

    pub async fn len(&self) -> usize {
        self.threads.lock().await.len()
    }
}

/// Worker that answers prompts with a domain-specific system prompt.
pub struct ChatModelWorker {
    domain: Domain,
    client: Arc<dyn ChatCompletion>,
    model: String,
    sessions: SessionStore,
}

impl ChatModelWorker {
    pub fn new(
        domain: Domain,
        client: Arc<dyn ChatCompletion>,
        model: impl Into<String>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            domain,
            client,
            model: model.into(),
            sessions,
        }
    }

    /// Full message list for one call: system prompt, thread history, prompt.
    fn build_messages(&self, history: &[ChatMessage], prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt(self.domain)));
        // Each worker supplies its own system prompt
        messages.extend(history.iter().filter(|m| m.role != "system").cloned());
        messages.push(ChatMessage::user(prompt));
        messages
    }
}

/// System prompt for a domain worker.
pub fn system_prompt(domain: Domain) -> String {
    let focus = match domain {
        Domain::Document => {
            "You handle documents: finding, reading, summarizing and editing files, reports and filings."
        }
        Domain::Media => "You handle media: videos, images, music and podcasts.",
        Domain::Task => "You handle tasks: to-dos, reminders and assignments.",
        Domain::Event => "You handle calendar events: meetings, appointments and schedules.",
        Domain::Web => "You handle web lookups: current events, public facts and online sources.",
        Domain::General => "You handle general questions that need no specialized tools.",
    };

    format!(
        "You are the {} worker of a multi-domain assistant. {}\n\n\
         Earlier messages in this conversation may come from other workers; use them as context. \
         Answer the request directly and concisely.",
        domain, focus
    )
}

#[async_trait]
impl Worker for ChatModelWorker {
    fn id(&self) -> &str {
        self.domain.as_str()
    }

    fn domain(&self) -> Domain {
        self.domain
    }

    async fn create_session(&self, context: &AgentContext) -> Result<String> {
        let thread_id = self.sessions.create(&context.history).await;
        log::info!(
            "[ChatModelWorker] Created thread {} for {} worker ({} history message(s))",
            thread_id,
            self.domain,
            context.history.len()
        );
        Ok(thread_id)
    }

    async fn invoke(&self, session: &str, prompt: &str) -> Result<String> {
        // Threads opened elsewhere (e.g. a caller-supplied id) start empty here
        let history = match self.sessions.messages(session).await {
            Some(history) => history,
            None => {
                log::debug!(
                    "[ChatModelWorker] Thread {} not in store, starting it with no history",
                    session
                );
                Vec::new()
            }
        };

        let messages = self.build_messages(&history, prompt);
        log::debug!(
            "[ChatModelWorker] {} worker sending {} message(s) on thread {}",
            self.domain,
            messages.len(),
            session
        );

        let reply = self.client.chat(&self.model, &messages).await?;

        // Empty replies are retried by the caller; keep them out of the thread
        if !reply.trim().is_empty() {
            self.sessions.append_exchange(session, prompt, &reply).await;
        }

        Ok(reply)
    }
}

impl WorkerRegistry {
    /// One gateway-backed chat worker per specialized domain, all sharing a
    /// single session store.
    pub fn gateway(config: &GatewayConfig) -> Result<Self> {
        let client: Arc<dyn ChatCompletion> = Arc::new(GatewayClient::new(config)?);
        let sessions = SessionStore::new();

        let mut registry = WorkerRegistry::new();
        for domain in Domain::SPECIALIZED {
            registry.register(Arc::new(ChatModelWorker::new(
                domain,
                client.clone(),
                config.model.clone(),
                sessions.clone(),
            )));
        }

        log::info!(
            "[ChatModelWorker] Registered {} gateway workers using model {}",
            registry.len(),
            config.model
        );
        Ok(registry)
    }
}
