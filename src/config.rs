// ABOUTME: TOML configuration for the gateway, planner and executor.
// ABOUTME: Loads from an explicit path or the platform config dir, falling back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{OrchestratorError, Result};

const CONFIG_DIR_NAME: &str = "hybrid-orchestrator";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

/// Chat completions gateway used by the planner and the domain workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for planning. Falls back to `model` when unset.
    #[serde(default)]
    pub planner_model: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.serendb.com/publishers/seren-models".to_string()
}

fn default_api_key_env() -> String {
    "HYBRID_ORCHESTRATOR_API_KEY".to_string()
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            planner_model: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl GatewayConfig {
    /// Resolve the bearer token from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn planner_model(&self) -> &str {
        self.planner_model.as_deref().unwrap_or(&self.model)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Wall-clock bound on one planning call.
    #[serde(default = "default_planner_timeout")]
    pub timeout_secs: u64,
}

fn default_planner_timeout() -> u64 {
    60
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_planner_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker invocations per step, counting the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Characters of each dependency's output forwarded into a dependent prompt.
    #[serde(default = "default_digest_chars")]
    pub dependency_digest_chars: usize,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_digest_chars() -> usize {
    200
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            dependency_digest_chars: default_digest_chars(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the file under the platform
    /// config directory is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    log::debug!("[Config] No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        log::info!("[Config] Loaded configuration from {}", path.display());
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| OrchestratorError::Config(format!("Invalid TOML: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        if self.executor.max_attempts == 0 {
            return Err(OrchestratorError::Config(
                "executor.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.gateway.base_url.trim().is_empty() {
            return Err(OrchestratorError::Config(
                "gateway.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `<config_dir>/hybrid-orchestrator/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_executor_contract() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.executor.max_attempts, 5);
        assert_eq!(config.executor.dependency_digest_chars, 200);
        assert_eq!(config.planner.timeout_secs, 60);
        assert_eq!(config.gateway.planner_model(), config.gateway.model);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = OrchestratorConfig::from_toml(
            r#"
            [gateway]
            model = "openai/gpt-5"
            planner_model = "anthropic/claude-opus-4-6"

            [executor]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.model, "openai/gpt-5");
        assert_eq!(config.gateway.planner_model(), "anthropic/claude-opus-4-6");
        assert_eq!(config.gateway.request_timeout_secs, 120);
        assert_eq!(config.executor.max_attempts, 3);
        assert_eq!(config.executor.dependency_digest_chars, 200);
    }

    #[test]
    fn loads_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[planner]\ntimeout_secs = 5").unwrap();

        let config = OrchestratorConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.planner.timeout_secs, 5);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let result = OrchestratorConfig::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[test]
    fn rejects_zero_attempts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executor]\nmax_attempts = 0").unwrap();

        let result = OrchestratorConfig::load(Some(file.path()));
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        let result = OrchestratorConfig::from_toml("[gateway\nmodel = ");
        assert!(result.is_err());
    }
}
