use crate::config::VertexAIProviderConfig;
use crate::env;
use crate::llm::framing::{self, SseDecoder};
use crate::llm::provider::{LLMProvider, require_non_empty, validate_base_url};
use crate::llm::types::{ChunkStream, GenerationChunk, GenerationRequest, LLMError, ProgressStream};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Client for Gemini models hosted on Google Vertex AI.
pub struct VertexAIProvider {
    client: reqwest::Client,
    base: String,
    default_model: String,
    access_token: Option<String>,
}

impl VertexAIProvider {
    pub fn new(client: reqwest::Client, config: &VertexAIProviderConfig) -> Result<Self, LLMError> {
        require_non_empty("project", &config.project)?;
        require_non_empty("location", &config.location)?;
        require_non_empty("default_model", &config.default_model)?;

        let base = match config.api_base {
            Some(ref api_base) => validate_base_url("api_base", api_base)?,
            None => format!(
                "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}",
                location = config.location.trim(),
                project = config.project.trim(),
            ),
        };

        let access_token = std::env::var(env::provider::VERTEX_ACCESS_TOKEN_VAR)
            .ok()
            .filter(|token| !token.trim().is_empty());
        if access_token.is_none() {
            warn!(
                "{} is not set; Vertex AI requests will be sent without credentials",
                env::provider::VERTEX_ACCESS_TOKEN_VAR
            );
        }

        Ok(Self {
            client,
            base,
            default_model: config.default_model.clone(),
            access_token,
        })
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/publishers/google/models/{}:{}", self.base, model, method)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.access_token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl LLMProvider for VertexAIProvider {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<ChunkStream, LLMError>> {
        Box::pin(async move {
            let model = request.model_or(&self.default_model).to_string();
            let url = if request.streaming {
                format!("{}?alt=sse", self.model_url(&model, "streamGenerateContent"))
            } else {
                self.model_url(&model, "generateContent")
            };

            debug!("POST {}", url);
            let response = self
                .authorized(self.client.post(&url))
                .json(&content_body(&request))
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| LLMError::unreachable(&url, e))?;

            if request.streaming {
                return Ok(framing::decode_stream(
                    response.bytes_stream(),
                    SseDecoder,
                    move |frame| candidate_chunk(&frame, &model),
                ));
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| LLMError::invalid(&url, e))?;
            if payload
                .get("candidates")
                .and_then(Value::as_array)
                .is_none_or(Vec::is_empty)
            {
                return Err(LLMError::EmptyResponse(
                    "response has no candidates".to_string(),
                ));
            }
            let chunk = candidate_chunk(&payload, &model).ok_or_else(|| {
                LLMError::InvalidResponse("candidate has no text parts".to_string())
            })?;
            Ok(stream::iter([Ok(chunk)]).boxed())
        })
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Value, LLMError>> {
        Box::pin(async move {
            let url = format!("{}/publishers/google/models", self.base);
            debug!("GET {}", url);
            let response = self
                .authorized(self.client.get(&url))
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| LLMError::unreachable(&url, e))?;
            response.json().await.map_err(|e| LLMError::invalid(&url, e))
        })
    }

    fn pull_model(&self, model_name: String) -> BoxFuture<'_, Result<ProgressStream, LLMError>> {
        Box::pin(async move {
            Err(LLMError::Unsupported(format!(
                "Vertex AI hosts '{}' remotely; models cannot be pulled",
                model_name
            )))
        })
    }

    fn provider_name(&self) -> &'static str {
        "vertexai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn endpoint(&self) -> &str {
        &self.base
    }
}

fn content_body(request: &GenerationRequest) -> Value {
    let mut generation_config = serde_json::Map::new();
    if let Some(max_tokens) = request.options.max_tokens {
        generation_config.insert("maxOutputTokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = request.options.temperature {
        generation_config.insert("temperature".to_string(), json!(temperature));
    }

    json!({
        "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
        "generationConfig": generation_config,
    })
}

/// Text of the first candidate; `None` when it carries no text parts.
fn candidate_chunk(payload: &Value, fallback_model: &str) -> Option<GenerationChunk> {
    let candidate = payload.get("candidates")?.get(0)?;
    let parts = candidate.get("content")?.get("parts")?.as_array()?;

    let texts: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        return None;
    }

    let is_final = candidate
        .get("finishReason")
        .is_some_and(|reason| !reason.is_null());
    let model = payload
        .get("modelVersion")
        .and_then(Value::as_str)
        .unwrap_or(fallback_model);
    Some(GenerationChunk::new(model, texts.concat(), is_final))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config() -> VertexAIProviderConfig {
        VertexAIProviderConfig {
            project: "demo".to_string(),
            location: "us-central1".to_string(),
            default_model: "gemini-1.5-pro".to_string(),
            api_base: None,
        }
    }

    #[test]
    #[serial]
    fn test_endpoint_derived_from_location() {
        let provider = VertexAIProvider::new(reqwest::Client::new(), &config()).unwrap();
        assert_eq!(
            provider.endpoint(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1"
        );
        assert_eq!(
            provider.model_url("gemini-1.5-pro", "generateContent"),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/demo/locations/us-central1/publishers/google/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    #[serial]
    fn test_access_token_from_environment() {
        unsafe {
            std::env::set_var(env::provider::VERTEX_ACCESS_TOKEN_VAR, "secret-token");
        }
        let provider = VertexAIProvider::new(reqwest::Client::new(), &config()).unwrap();
        assert_eq!(provider.access_token.as_deref(), Some("secret-token"));

        unsafe {
            std::env::remove_var(env::provider::VERTEX_ACCESS_TOKEN_VAR);
        }
        let provider = VertexAIProvider::new(reqwest::Client::new(), &config()).unwrap();
        assert!(provider.access_token.is_none());
    }

    #[test]
    fn test_content_body() {
        let request = GenerationRequest::new("", "hi").max_tokens(64);
        let body = content_body(&request);
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 64);
    }

    #[test]
    fn test_candidate_chunk() {
        let payload = json!({
            "modelVersion": "gemini-1.5-pro-002",
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo"}]},
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            candidate_chunk(&payload, "x"),
            Some(GenerationChunk::new("gemini-1.5-pro-002", "Hello", true))
        );

        let no_text = json!({"candidates": [{"content": {"parts": [{"inlineData": {}}]}}]});
        assert_eq!(candidate_chunk(&no_text, "x"), None);
    }

    #[tokio::test]
    #[serial]
    async fn test_pull_is_unsupported() {
        let provider = VertexAIProvider::new(reqwest::Client::new(), &config()).unwrap();
        let result = provider.pull_model("gemini".to_string()).await;
        assert!(matches!(result, Err(LLMError::Unsupported(_))));
    }
}
