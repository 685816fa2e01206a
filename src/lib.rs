//! # Local LLM Backend
//!
//! A local control plane that supervises externally launched worker
//! processes ("miners") by logical name and proxies text generation to one
//! of several interchangeable LLM providers.
//!
//! ## Architecture Overview
//!
//! - **[`supervisor`]**: owns the process table; the only component that
//!   spawns or kills worker processes
//! - **[`llm`]**: provider-agnostic generation gateway normalizing upstream
//!   streaming protocols into chunk sequences
//! - **[`config`]**: backend configuration document, its stores, and
//!   service settings discovery
//! - **[`control`]**: serializes access to both under concurrent requests
//!   and hot-swaps the active provider
//! - **[`server`]**: the HTTP surface
//! - **[`cli`]**: command line parsing for the binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use local_llm_backend::config::JsonFileConfigStore;
//! use local_llm_backend::control::ControlPlaneService;
//! use local_llm_backend::llm::ProviderFactory;
//! use local_llm_backend::supervisor::ProcessSupervisor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = Arc::new(
//!         ControlPlaneService::new(
//!             Arc::new(JsonFileConfigStore::new("config.json")),
//!             ProviderFactory::default(),
//!             Arc::new(ProcessSupervisor::default()),
//!         )
//!         .await?,
//!     );
//!
//!     let handle = local_llm_backend::server::serve(service.clone(), "127.0.0.1:8000").await?;
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown().await?;
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod control;
pub mod env;
pub mod llm;
pub mod server;
pub mod supervisor;

pub use config::{BackendConfiguration, ProviderConfig, WorkerDefinition};
pub use control::{ControlError, ControlPlaneService, ErrorKind};
pub use llm::{GenerationChunk, GenerationRequest, LLMProvider, ProviderFactory};
pub use supervisor::{ProcessStatus, ProcessSupervisor};
