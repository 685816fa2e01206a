use crate::env;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Current version of the backend configuration document.
pub const CONFIG_VERSION: u32 = 1;

/// A worker that can be launched under its logical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDefinition {
    /// Unique logical name
    pub name: String,
    #[serde(alias = "miner_path")]
    pub executable_path: PathBuf,
    #[serde(alias = "wallet")]
    pub wallet_address: String,
    #[serde(alias = "pool")]
    pub pool_address: String,
    #[serde(alias = "coin")]
    pub coin_symbol: String,
    #[serde(alias = "worker")]
    pub worker_label: String,
    #[serde(default, alias = "device", skip_serializing_if = "Option::is_none")]
    pub device_index: Option<u32>,
}

/// Ollama-style (OpenAI-compatible) provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaProviderConfig {
    #[serde(default = "default_ollama_api_base")]
    pub api_base: String,
    #[serde(default = "default_ollama_model")]
    pub default_model: String,
}

/// Google Vertex AI provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexAIProviderConfig {
    pub project: String,
    pub location: String,
    pub default_model: String,
    /// Endpoint override; derived from `location` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// Active LLM provider, selected by the `provider` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama(OllamaProviderConfig),
    #[serde(rename = "vertexai")]
    VertexAI(VertexAIProviderConfig),
}

impl ProviderConfig {
    /// Discriminator value as written in the document
    pub fn discriminator(&self) -> &'static str {
        match self {
            ProviderConfig::Ollama(_) => "ollama",
            ProviderConfig::VertexAI(_) => "vertexai",
        }
    }

    pub fn default_model(&self) -> &str {
        match self {
            ProviderConfig::Ollama(config) => &config.default_model,
            ProviderConfig::VertexAI(config) => &config.default_model,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Ollama(OllamaProviderConfig::default())
    }
}

impl Default for OllamaProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_ollama_api_base(),
            default_model: default_ollama_model(),
        }
    }
}

/// The whole backend configuration document.
///
/// Replaced wholesale on update; there is no partial field merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfiguration {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, alias = "miners")]
    pub workers: Vec<WorkerDefinition>,
    #[serde(default)]
    pub llm: ProviderConfig,
}

impl Default for BackendConfiguration {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            workers: Vec::new(),
            llm: ProviderConfig::default(),
        }
    }
}

impl BackendConfiguration {
    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: BackendConfiguration =
            serde_json::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check document-level invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version > CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported configuration version {} (newest known is {})",
                self.version, CONFIG_VERSION
            )));
        }

        let mut seen = HashSet::new();
        for worker in &self.workers {
            if worker.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "worker name must not be empty".to_string(),
                ));
            }
            if !env::is_valid_worker_name(&worker.name) {
                return Err(ConfigError::Invalid(format!(
                    "worker name '{}' must not contain path separators",
                    worker.name
                )));
            }
            if worker.executable_path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "worker '{}' has no executable path",
                    worker.name
                )));
            }
            if !seen.insert(worker.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate worker name '{}'",
                    worker.name
                )));
            }
        }

        Ok(())
    }

    pub fn worker(&self, name: &str) -> Option<&WorkerDefinition> {
        self.workers.iter().find(|w| w.name == name)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to persist configuration to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read configuration from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_ollama_api_base() -> String {
    env::provider::DEFAULT_OLLAMA_API_BASE.to_string()
}

fn default_ollama_model() -> String {
    env::provider::DEFAULT_OLLAMA_MODEL.to_string()
}
