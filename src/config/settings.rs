//! Service settings and their discovery
//!
//! Settings are looked up in this order:
//! 1. Current directory: ./local-llm.toml or ./.local-llm/settings.toml
//! 2. User settings: ~/.local-llm/settings.toml
//! 3. System settings: /etc/local-llm/settings.toml
//! 4. Built-in defaults

use super::ConfigError;
use crate::env;
use crate::supervisor::SupervisorConfig;
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Process-level settings of the service (as opposed to the backend
/// configuration document, which is edited at runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Address the HTTP surface listens on
    pub bind_address: String,
    /// Backend configuration document; `~/.local-llm/config.json` when unset
    pub config_path: Option<PathBuf>,
    /// Worker output logs; `~/.local-llm/logs` when unset
    pub log_dir: Option<PathBuf>,
    pub stop_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            bind_address: env::DEFAULT_BIND_ADDRESS.to_string(),
            config_path: None,
            log_dir: None,
            stop_timeout_secs: env::worker::DEFAULT_STOP_TIMEOUT_SECS,
            connect_timeout_secs: env::provider::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl ServiceSettings {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        fs::write(path, content).map_err(|source| ConfigError::Persist {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Backend configuration path with the default applied
    pub fn resolved_config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| env::backend_config_file_path(&default_root()))
    }

    /// Worker log directory with the default applied
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| env::worker_logs_dir_path(&default_root()))
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            stop_timeout: self.stop_timeout(),
            log_dir: Some(self.resolved_log_dir()),
        }
    }
}

/// Settings discovery system
pub struct SettingsDiscovery;

impl SettingsDiscovery {
    /// Discover and load settings using the hierarchy.
    ///
    /// Returns the settings together with the file they came from.
    pub fn discover() -> Result<(ServiceSettings, Option<PathBuf>), ConfigError> {
        if let Some(path) = Self::find_settings_file() {
            info!("Loading settings from: {:?}", path);
            let settings = ServiceSettings::from_toml_file(&path)?;
            return Ok((settings, Some(path)));
        }

        info!("No settings file found, using defaults");
        Ok((ServiceSettings::default(), None))
    }

    /// Find settings file using discovery hierarchy
    pub fn find_settings_file() -> Option<PathBuf> {
        for candidate in Self::candidates() {
            debug!("Checking for settings file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found settings file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No settings file found in discovery hierarchy");
        None
    }

    /// Settings file candidates in priority order
    pub fn candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_SETTINGS_FILE_NAME));
            candidates.push(env::local_settings_file_path(&current_dir));
        }

        if let Some(home_dir) = home_dir() {
            candidates.push(env::user_settings_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/local-llm").join(env::SETTINGS_FILE_NAME));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("local-llm")
                    .join(env::SETTINGS_FILE_NAME),
            );
        }

        candidates
    }

    /// Write default settings to the user's home directory unless present
    pub fn create_default_user_settings() -> Result<PathBuf, ConfigError> {
        let home_dir = home_dir().ok_or_else(|| {
            ConfigError::Invalid("could not determine home directory".to_string())
        })?;
        Self::create_default_settings_in(&home_dir)
    }

    pub(crate) fn create_default_settings_in(root: &Path) -> Result<PathBuf, ConfigError> {
        let settings_dir = env::app_dir_path(root);
        let settings_path = env::user_settings_file_path(root);

        fs::create_dir_all(&settings_dir).map_err(|source| ConfigError::Persist {
            path: settings_dir.clone(),
            source,
        })?;

        if settings_path.exists() {
            warn!("Settings file already exists: {:?}", settings_path);
        } else {
            ServiceSettings::default().to_toml_file(&settings_path)?;
            info!("Created default settings file: {:?}", settings_path);
        }

        Ok(settings_path)
    }

    /// Print the discovery hierarchy for debugging
    pub fn show_discovery_info() {
        println!("Settings Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::candidates().iter().enumerate() {
            let status = match (candidate.exists(), candidate.is_file()) {
                (true, true) => "✓ EXISTS",
                (true, false) => "✗ NOT A FILE",
                _ => "✗ NOT FOUND",
            };
            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_settings_file() {
            Some(found) => println!("Active settings: {:?}", found),
            None => println!("Active settings: Built-in defaults"),
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std_env::var("HOME")
        .ok()
        .or_else(|| std_env::var("USERPROFILE").ok())
        .map(PathBuf::from)
}

/// Home directory, or the current directory when no home is known
fn default_root() -> PathBuf {
    home_dir()
        .or_else(|| std_env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
