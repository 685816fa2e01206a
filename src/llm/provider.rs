use crate::config::ProviderConfig;
use crate::llm::ollama_provider::OllamaProvider;
use crate::llm::types::{ChunkStream, GenerationRequest, LLMError, ProgressStream};
use crate::llm::vertex_provider::VertexAIProvider;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Capability set shared by every LLM backend
pub trait LLMProvider: Send + Sync {
    /// Run a generation call.
    ///
    /// Always yields a sequence: non-streaming requests produce exactly one
    /// chunk from a single buffered upstream call, streaming requests decode
    /// the upstream body incrementally. Connection failures while
    /// establishing the call are returned here, before any chunk exists.
    fn generate(&self, request: GenerationRequest)
    -> BoxFuture<'_, Result<ChunkStream, LLMError>>;

    /// Provider-specific model catalog, passed through untouched
    fn list_models(&self) -> BoxFuture<'_, Result<serde_json::Value, LLMError>>;

    /// Download a model, streaming the provider's progress records
    fn pull_model(&self, model_name: String) -> BoxFuture<'_, Result<ProgressStream, LLMError>>;

    /// Test provider connectivity
    fn health_check(&self) -> BoxFuture<'_, Result<(), LLMError>> {
        Box::pin(async move { self.list_models().await.map(|_| ()) })
    }

    /// Discriminator of the configuration this client was built from
    fn provider_name(&self) -> &'static str;

    fn default_model(&self) -> &str;

    /// Base URL the client talks to
    fn endpoint(&self) -> &str;
}

/// Builds the active provider client from its configuration.
///
/// Holds one HTTP client that every provider it builds shares, so a
/// hot-swap keeps the connection pool.
#[derive(Clone)]
pub struct ProviderFactory {
    client: reqwest::Client,
}

impl ProviderFactory {
    pub fn new(connect_timeout: Duration) -> Result<Self, LLMError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| LLMError::InvalidConfig(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Construct the client matching the configured discriminator.
    ///
    /// Validation happens before anything is built, so an invalid
    /// configuration never yields a half-configured client.
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn LLMProvider>, LLMError> {
        let provider: Arc<dyn LLMProvider> = match config {
            ProviderConfig::Ollama(ollama) => {
                Arc::new(OllamaProvider::new(self.client.clone(), ollama)?)
            }
            ProviderConfig::VertexAI(vertex) => {
                Arc::new(VertexAIProvider::new(self.client.clone(), vertex)?)
            }
        };

        info!(
            "Created {} provider for {} (default model {})",
            provider.provider_name(),
            provider.endpoint(),
            provider.default_model()
        );
        Ok(provider)
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

/// Reject empty required fields.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), LLMError> {
    if value.trim().is_empty() {
        return Err(LLMError::InvalidConfig(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Parse an HTTP(S) base URL and return it without a trailing slash.
pub(crate) fn validate_base_url(field: &str, value: &str) -> Result<String, LLMError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| LLMError::InvalidConfig(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LLMError::InvalidConfig(format!(
            "{} must use http or https, got '{}'",
            field,
            parsed.scheme()
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}
