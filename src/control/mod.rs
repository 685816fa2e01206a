//! # Control Plane
//!
//! Serializes access to the process supervisor and the generation gateway
//! under concurrent requests.
//!
//! ## Core Components
//!
//! - **[`ControlPlaneService`]**: owns the (configuration, provider client)
//!   pair and routes worker and generation traffic
//! - **[`ActiveState`]**: the pair, published atomically behind one `Arc`
//! - **[`ControlError`]** / **[`ErrorKind`]**: failures classified for callers
//! - **[`launch_command`]**: worker definition to miner command line
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use local_llm_backend::config::JsonFileConfigStore;
//! use local_llm_backend::control::ControlPlaneService;
//! use local_llm_backend::llm::ProviderFactory;
//! use local_llm_backend::supervisor::ProcessSupervisor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ControlPlaneService::new(
//!         Arc::new(JsonFileConfigStore::new("config.json")),
//!         ProviderFactory::default(),
//!         Arc::new(ProcessSupervisor::default()),
//!     )
//!     .await?;
//!
//!     let pid = service.start_worker("rig1").await?;
//!     println!("rig1 running as PID {}", pid);
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod error;
pub mod service;


pub use command::launch_command;
pub use error::{ControlError, ErrorKind, Result};
pub use service::{
    ActiveState, ControlPlaneService, ProviderState, ProviderStatusReport, WorkerStatusReport,
};
