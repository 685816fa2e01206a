use crate::config::OllamaProviderConfig;
use crate::llm::framing::{self, NdjsonDecoder, SseDecoder};
use crate::llm::provider::{LLMProvider, require_non_empty, validate_base_url};
use crate::llm::types::{ChunkStream, GenerationChunk, GenerationRequest, LLMError, ProgressStream};
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;
use serde_json::{Value, json};
use tracing::debug;

/// Client for an Ollama server through its OpenAI-compatible API.
///
/// Generation goes to `{api_base}/chat/completions`; the model catalog and
/// pulls use Ollama's native API under the server root.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_base: String,
    server_root: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(client: reqwest::Client, config: &OllamaProviderConfig) -> Result<Self, LLMError> {
        require_non_empty("default_model", &config.default_model)?;
        let api_base = validate_base_url("api_base", &config.api_base)?;
        let server_root = server_root(&api_base);

        Ok(Self {
            client,
            api_base,
            server_root,
            default_model: config.default_model.clone(),
        })
    }

    fn chat_body(&self, model: &str, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": request.prompt}],
            "stream": request.streaming,
        });
        if let Some(max_tokens) = request.options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = request.options.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, LLMError> {
        debug!("POST {}", url);
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| LLMError::unreachable(url, e))
    }
}

impl LLMProvider for OllamaProvider {
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> BoxFuture<'_, Result<ChunkStream, LLMError>> {
        Box::pin(async move {
            let model = request.model_or(&self.default_model).to_string();
            let url = format!("{}/chat/completions", self.api_base);
            let response = self.post(&url, &self.chat_body(&model, &request)).await?;

            if request.streaming {
                return Ok(framing::decode_stream(
                    response.bytes_stream(),
                    SseDecoder,
                    move |frame| chat_delta(&frame, &model),
                ));
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| LLMError::invalid(&url, e))?;
            let chunk = chat_message(&payload, &model)?;
            Ok(stream::iter([Ok(chunk)]).boxed())
        })
    }

    fn list_models(&self) -> BoxFuture<'_, Result<Value, LLMError>> {
        Box::pin(async move {
            let url = format!("{}/api/tags", self.server_root);
            debug!("GET {}", url);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| LLMError::unreachable(&url, e))?;
            response.json().await.map_err(|e| LLMError::invalid(&url, e))
        })
    }

    fn pull_model(&self, model_name: String) -> BoxFuture<'_, Result<ProgressStream, LLMError>> {
        Box::pin(async move {
            let url = format!("{}/api/pull", self.server_root);
            let body = json!({"name": model_name, "stream": true});
            let response = self.post(&url, &body).await?;
            Ok(framing::decode_stream(
                response.bytes_stream(),
                NdjsonDecoder,
                Some,
            ))
        })
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn endpoint(&self) -> &str {
        &self.api_base
    }
}

/// Ollama serves its native API one level above the `/v1` compatibility path.
fn server_root(api_base: &str) -> String {
    api_base
        .strip_suffix("/v1")
        .unwrap_or(api_base)
        .to_string()
}

/// Chunk from one streamed frame; frames without delta content are noise.
fn chat_delta(frame: &Value, fallback_model: &str) -> Option<GenerationChunk> {
    let choice = frame.get("choices")?.get(0)?;
    let content = choice.get("delta")?.get("content")?.as_str()?;
    let is_final = choice
        .get("finish_reason")
        .is_some_and(|reason| !reason.is_null());
    let model = frame
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(fallback_model);
    Some(GenerationChunk::new(model, content, is_final))
}

/// Chunk from a buffered completion response.
fn chat_message(payload: &Value, fallback_model: &str) -> Result<GenerationChunk, LLMError> {
    let choice = payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .ok_or_else(|| LLMError::EmptyResponse("completion has no choices".to_string()))?;
    let content = choice
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            LLMError::InvalidResponse("completion choice has no message content".to_string())
        })?;
    let model = payload
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(fallback_model);
    Ok(GenerationChunk::new(model, content, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_root_strips_compat_path() {
        assert_eq!(server_root("http://x:11434/v1"), "http://x:11434");
        assert_eq!(server_root("http://x:11434"), "http://x:11434");
    }

    #[test]
    fn test_chat_delta() {
        let frame = json!({
            "model": "llama2",
            "choices": [{"delta": {"content": "Hel"}, "finish_reason": null}]
        });
        assert_eq!(
            chat_delta(&frame, "fallback"),
            Some(GenerationChunk::new("llama2", "Hel", false))
        );

        let frame = json!({"choices": [{"delta": {"content": ""}, "finish_reason": "stop"}]});
        assert_eq!(
            chat_delta(&frame, "fallback"),
            Some(GenerationChunk::new("fallback", "", true))
        );

        let role_only = json!({"choices": [{"delta": {"role": "assistant"}}]});
        assert_eq!(chat_delta(&role_only, "fallback"), None);
        assert_eq!(chat_delta(&json!({"choices": []}), "fallback"), None);
    }

    #[test]
    fn test_chat_message() {
        let payload = json!({
            "model": "llama2",
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(
            chat_message(&payload, "x").unwrap(),
            GenerationChunk::new("llama2", "hello", true)
        );

        assert!(matches!(
            chat_message(&json!({"choices": []}), "x"),
            Err(LLMError::EmptyResponse(_))
        ));
        assert!(matches!(
            chat_message(&json!({"choices": [{"message": {}}]}), "x"),
            Err(LLMError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_chat_body_carries_options() {
        let provider = OllamaProvider::new(
            reqwest::Client::new(),
            &OllamaProviderConfig::default(),
        )
        .unwrap();
        let request = GenerationRequest::new("", "hi").max_tokens(100);
        let body = provider.chat_body("llama2", &request);

        assert_eq!(body["model"], "llama2");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 100);
        assert!(body.get("temperature").is_none());
    }
}
