// ABOUTME: Error type shared by the orchestrator and its external collaborators.
// ABOUTME: Covers config, gateway transport, parsing, timeouts and worker lookup failures.

use thiserror::Error;

/// Infrastructure failures raised by collaborators (gateway, workers, config).
///
/// Domain-level failures never surface as this type from `process_query`:
/// the planner and executor recover them close to their source.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway returned HTTP {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("Gateway request failed: {0}")]
    Transport(String),

    #[error("Stream read error: {0}")]
    Stream(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Session error: {0}")]
    Session(String),

    #[error("No worker registered for domain {0}")]
    NoWorker(String),
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(err: reqwest::Error) -> Self {
        OrchestratorError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
