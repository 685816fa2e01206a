use crate::llm::{GenerateOptions, GenerationRequest};
use crate::supervisor::ProcessStatus;
use serde::{Deserialize, Serialize};

pub const LIVENESS_MESSAGE: &str = "Local LLM Control Backend is running!";

/// Upper bound on generated tokens when the caller sets none
pub const DEFAULT_MAX_TOKENS: u32 = 100;

/// Body of `POST /generation/run`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub model: String,
    pub prompt: String,
    #[serde(default, alias = "stream")]
    pub streaming: bool,
    #[serde(default = "default_max_tokens", alias = "maxTokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl From<GenerateBody> for GenerationRequest {
    fn from(body: GenerateBody) -> Self {
        GenerationRequest {
            model: body.model,
            prompt: body.prompt,
            streaming: body.streaming,
            options: GenerateOptions {
                max_tokens: Some(body.max_tokens),
                temperature: body.temperature,
            },
        }
    }
}

/// Body of `POST /generation/pull`
#[derive(Debug, Clone, Deserialize)]
pub struct PullBody {
    #[serde(alias = "name", alias = "modelName")]
    pub model_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStartedResponse {
    pub message: String,
    pub name: String,
    pub pid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopAllResponse {
    pub message: String,
    pub stopped: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatusResponse {
    pub name: String,
    pub status: ProcessStatus,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
