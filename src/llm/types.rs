use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// One unit of a generation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationChunk {
    pub model: String,
    pub delta_content: String,
    pub is_final: bool,
}

impl GenerationChunk {
    pub fn new(model: impl Into<String>, delta_content: impl Into<String>, is_final: bool) -> Self {
        Self {
            model: model.into(),
            delta_content: delta_content.into(),
            is_final,
        }
    }
}

/// Sampling knobs forwarded to the upstream provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A single generation call.
///
/// An empty `model` means "use the provider's default model".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub streaming: bool,
    #[serde(default)]
    pub options: GenerateOptions,
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    /// Requested model, falling back to `default_model` when unset.
    pub fn model_or<'a>(&'a self, default_model: &'a str) -> &'a str {
        if self.model.trim().is_empty() {
            default_model
        } else {
            &self.model
        }
    }
}

/// Provider-specific pull progress record, passed through untouched.
pub type PullProgress = serde_json::Value;

/// Lazy, finite, one-shot sequence of generation chunks.
///
/// A trailing `Err` means the upstream failed mid-stream; chunks yielded
/// before it remain valid.
pub type ChunkStream = BoxStream<'static, Result<GenerationChunk, LLMError>>;

/// Lazy sequence of model pull progress records.
pub type ProgressStream = BoxStream<'static, Result<PullProgress, LLMError>>;

/// Generation gateway errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    /// Connection refused, timeout or non-2xx status
    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("Upstream returned no data: {0}")]
    EmptyResponse(String),

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl LLMError {
    pub(crate) fn unreachable(url: &str, error: reqwest::Error) -> Self {
        LLMError::UpstreamUnreachable(format!("{}: {}", url, error))
    }

    pub(crate) fn invalid(url: &str, error: impl std::fmt::Display) -> Self {
        LLMError::InvalidResponse(format!("{}: {}", url, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_fallback() {
        let request = GenerationRequest::new("", "hi");
        assert_eq!(request.model_or("llama2"), "llama2");

        let request = GenerationRequest::new("mistral", "hi");
        assert_eq!(request.model_or("llama2"), "mistral");
    }

    #[test]
    fn test_request_builder() {
        let request = GenerationRequest::new("llama2", "hi")
            .streaming(true)
            .max_tokens(100);
        assert!(request.streaming);
        assert_eq!(request.options.max_tokens, Some(100));
        assert_eq!(request.options.temperature, None);
    }
}
