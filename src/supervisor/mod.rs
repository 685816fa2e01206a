//! # Process Supervisor
//!
//! Single source of truth for which logical workers are alive, and the only
//! component permitted to spawn or kill their OS processes.
//!
//! ## Core Components
//!
//! - **[`ProcessSupervisor`]**: owns the process table behind a mutex and
//!   exposes `start` / `stop` / `status` / `stop_all`
//! - **[`LaunchCommand`]**: program, positional arguments and working directory
//! - **[`ProcessHandle`]**: one tracked child with its lifecycle state
//! - **[`terminate`]**: platform process-tree termination
//!
//! ## Lifecycle
//!
//! ```text
//!  (none) ──start──▶ Running ──stop──▶ Stopping ──▶ (removed)
//!                       │
//!                       └──exits on its own──▶ Exited ──start/stop/list_running──▶ (removed)
//! ```
//!
//! `status` always re-polls the OS, so a worker that dies on its own shows up
//! as `Stopped` on the very next check.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use local_llm_backend::supervisor::{LaunchCommand, ProcessStatus, ProcessSupervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let supervisor = ProcessSupervisor::default();
//!     let command = LaunchCommand::new("sleep", vec!["30".to_string()]);
//!
//!     assert!(supervisor.start("rig1", command.clone())?);
//!     assert!(!supervisor.start("rig1", command)?);
//!     assert_eq!(supervisor.status("rig1"), ProcessStatus::Running);
//!
//!     supervisor.stop("rig1").await?;
//!     assert_eq!(supervisor.status("rig1"), ProcessStatus::NotFound);
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod terminate;
pub mod types;


pub use manager::ProcessSupervisor;
pub use types::*;
