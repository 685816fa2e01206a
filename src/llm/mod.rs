//! # Generation Gateway
//!
//! One capability set (generate, list models, pull model) over
//! interchangeable LLM backends, with their streaming protocols normalized
//! into [`GenerationChunk`] sequences.
//!
//! ## Core Components
//!
//! - **[`LLMProvider`]**: trait every backend client implements
//! - **[`ProviderFactory`]**: builds the client matching a [`crate::config::ProviderConfig`]
//! - **[`OllamaProvider`]**: OpenAI-compatible chat completions plus Ollama's native catalog and pull API
//! - **[`VertexAIProvider`]**: Gemini models on Google Vertex AI
//! - **[`framing`]**: per-provider line framing of streamed bodies
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use local_llm_backend::config::ProviderConfig;
//! use local_llm_backend::llm::{GenerationRequest, ProviderFactory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = ProviderFactory::default().create_provider(&ProviderConfig::default())?;
//!
//!     let request = GenerationRequest::new("llama2", "Why is the sky blue?").streaming(true);
//!     let mut chunks = provider.generate(request).await?;
//!     while let Some(chunk) = chunks.next().await {
//!         print!("{}", chunk?.delta_content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod framing;
pub mod ollama_provider;
pub mod provider;
pub mod types;
pub mod vertex_provider;

pub use ollama_provider::OllamaProvider;
pub use provider::{LLMProvider, ProviderFactory};
pub use types::*;
pub use vertex_provider::VertexAIProvider;
