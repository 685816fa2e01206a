//! Environment constants and path utilities for the local LLM backend.
//!
//! This module centralizes the hardcoded paths, file names and defaults used
//! throughout the service so they can be changed in one place.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name (hidden directory like .git, .vscode)
pub const APP_DIR_NAME: &str = ".local-llm";

/// Service settings file name (TOML)
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Settings file name looked up directly in the current directory
pub const LOCAL_SETTINGS_FILE_NAME: &str = "local-llm.toml";

/// Backend configuration document name (JSON)
pub const BACKEND_CONFIG_FILE_NAME: &str = "config.json";

/// Directory holding per-worker output logs
pub const WORKER_LOGS_DIR_NAME: &str = "logs";

/// Default address the HTTP surface binds to
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";

/// Provider-related defaults
pub mod provider {
    /// Default OpenAI-compatible endpoint of a local Ollama server
    pub const DEFAULT_OLLAMA_API_BASE: &str = "http://localhost:11434/v1";

    /// Default model requested when none is configured
    pub const DEFAULT_OLLAMA_MODEL: &str = "llama2";

    /// Environment variable holding a Vertex AI OAuth access token
    pub const VERTEX_ACCESS_TOKEN_VAR: &str = "VERTEX_ACCESS_TOKEN";

    /// Default upstream connect timeout in seconds
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
}

/// Worker-related defaults
pub mod worker {
    /// Password flag value passed to pool-based workers
    pub const POOL_PASSWORD: &str = "x";

    /// Default grace period before a stopping worker is force-killed
    pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;
}

/// Default grace period before a stopping worker is force-killed
pub fn default_stop_timeout() -> Duration {
    Duration::from_secs(worker::DEFAULT_STOP_TIMEOUT_SECS)
}

/// Build the application directory path under a root (home or project dir)
pub fn app_dir_path(root: &Path) -> PathBuf {
    root.join(APP_DIR_NAME)
}

/// Build settings file path in user's home directory
pub fn user_settings_file_path(home_dir: &Path) -> PathBuf {
    app_dir_path(home_dir).join(SETTINGS_FILE_NAME)
}

/// Build local settings file path in current directory
pub fn local_settings_file_path(current_dir: &Path) -> PathBuf {
    app_dir_path(current_dir).join(SETTINGS_FILE_NAME)
}

/// Build the default backend configuration path under a root
pub fn backend_config_file_path(root: &Path) -> PathBuf {
    app_dir_path(root).join(BACKEND_CONFIG_FILE_NAME)
}

/// Build the default worker log directory under a root
pub fn worker_logs_dir_path(root: &Path) -> PathBuf {
    app_dir_path(root).join(WORKER_LOGS_DIR_NAME)
}

/// Build the log file path for one worker
/// Whether `name` can be used as a single file name under the log directory.
pub fn is_valid_worker_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

pub fn worker_log_file_path(log_dir: &Path, worker_name: &str) -> PathBuf {
    log_dir.join(format!("{}.log", worker_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_construction() {
        let root = Path::new("/home/user");

        assert_eq!(app_dir_path(root), Path::new("/home/user/.local-llm"));
        assert_eq!(
            backend_config_file_path(root),
            Path::new("/home/user/.local-llm/config.json")
        );
        assert_eq!(
            worker_logs_dir_path(root),
            Path::new("/home/user/.local-llm/logs")
        );
        assert_eq!(
            worker_log_file_path(&worker_logs_dir_path(root), "rig1"),
            Path::new("/home/user/.local-llm/logs/rig1.log")
        );
    }

    #[test]
    fn test_worker_names_stay_inside_log_dir() {
        assert!(is_valid_worker_name("rig1"));
        assert!(is_valid_worker_name("gpu-0.main"));
        assert!(!is_valid_worker_name(""));
        assert!(!is_valid_worker_name(".."));
        assert!(!is_valid_worker_name("farm/rig1"));
        assert!(!is_valid_worker_name("../escaped"));
        assert!(!is_valid_worker_name("farm\\rig1"));
    }

    #[test]
    fn test_settings_paths() {
        let home_dir = Path::new("/home/user");
        let current_dir = Path::new("/current/project");

        assert_eq!(
            user_settings_file_path(home_dir),
            Path::new("/home/user/.local-llm/settings.toml")
        );
        assert_eq!(
            local_settings_file_path(current_dir),
            Path::new("/current/project/.local-llm/settings.toml")
        );
    }
}
