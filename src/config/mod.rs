//! # Configuration
//!
//! Two documents configure the service:
//!
//! - **[`BackendConfiguration`]**: the versioned JSON document edited at
//!   runtime through `POST /config` (worker definitions and the active LLM
//!   provider), loaded and saved through a [`ConfigStore`]
//! - **[`ServiceSettings`]**: process-level TOML settings (bind address,
//!   file locations, timeouts) found by [`SettingsDiscovery`]

pub mod settings;
pub mod store;
pub mod types;

pub use settings::{ServiceSettings, SettingsDiscovery};
pub use store::{ConfigStore, JsonFileConfigStore, MemoryConfigStore};
pub use types::*;
