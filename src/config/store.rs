use super::types::{BackendConfiguration, ConfigError};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Load/save contract for the backend configuration document
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current document, or the default configuration when none exists yet
    async fn load(&self) -> Result<BackendConfiguration, ConfigError>;

    /// Persist `config`, replacing the previous document
    async fn save(&self, config: &BackendConfiguration) -> Result<(), ConfigError>;
}

/// JSON document on disk, written atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the default document unless one already exists.
    ///
    /// Returns whether a new file was created.
    pub async fn init_default(&self) -> Result<bool, ConfigError> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(false);
        }
        self.save(&BackendConfiguration::default()).await?;
        info!("Created default backend configuration: {:?}", self.path);
        Ok(true)
    }

    fn persist_error(&self, source: io::Error) -> ConfigError {
        ConfigError::Persist {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    async fn load(&self) -> Result<BackendConfiguration, ConfigError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    "No backend configuration at {:?}, using defaults",
                    self.path
                );
                return Ok(BackendConfiguration::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let config = BackendConfiguration::from_json(&text)?;
        debug!(
            "Loaded backend configuration from {:?} ({} workers, provider {})",
            self.path,
            config.workers.len(),
            config.llm.discriminator()
        );
        Ok(config)
    }

    async fn save(&self, config: &BackendConfiguration) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.persist_error(e))?;
        }

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| self.persist_error(e))?;
        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.persist_error(e));
        }

        debug!("Saved backend configuration to {:?}", self.path);
        Ok(())
    }
}

/// In-memory store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    document: Mutex<Option<BackendConfiguration>>,
    fail_saves: AtomicBool,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BackendConfiguration) -> Self {
        Self {
            document: Mutex::new(Some(config)),
            fail_saves: AtomicBool::new(false),
        }
    }

    /// Make subsequent saves fail with a persistence error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Last saved document, if any
    pub fn stored(&self) -> Option<BackendConfiguration> {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<BackendConfiguration, ConfigError> {
        Ok(self.stored().unwrap_or_default())
    }

    async fn save(&self, config: &BackendConfiguration) -> Result<(), ConfigError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ConfigError::Persist {
                path: PathBuf::from("<memory>"),
                source: io::Error::other("saves disabled"),
            });
        }
        config.validate()?;
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        Ok(())
    }
}
