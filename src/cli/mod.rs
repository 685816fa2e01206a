//! CLI-specific functionality for the local LLM backend
//!
//! Argument parsing and the mapping from command line flags onto
//! [`ServiceSettings`](crate::config::ServiceSettings).

pub mod args;

pub use args::{Args, Commands, ExecutionMode, ServeConfig, load_settings};
