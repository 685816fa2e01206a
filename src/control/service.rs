use super::command::launch_command;
use super::error::{ControlError, Result};
use crate::config::{BackendConfiguration, ConfigStore};
use crate::llm::{ChunkStream, GenerationChunk, GenerationRequest, LLMError, LLMProvider, ProgressStream, ProviderFactory};
use crate::supervisor::{ProcessStatus, ProcessSupervisor};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// The configuration and the provider client built from it, published as
/// one unit.
pub struct ActiveState {
    pub config: BackendConfiguration,
    pub provider: Arc<dyn LLMProvider>,
}

/// Liveness of the active provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatusReport {
    pub status: ProviderState,
    pub provider: String,
    pub default_model: String,
    pub endpoint: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatusReport {
    pub name: String,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Orchestrates worker control and generation over shared state.
///
/// Worker traffic goes to the [`ProcessSupervisor`]; generation traffic
/// goes to whichever provider client is active when the call starts. A
/// configuration update swaps configuration and client together, and a
/// call that already captured the previous client finishes on it.
pub struct ControlPlaneService {
    state: RwLock<Arc<ActiveState>>,
    /// Serializes updates so persist order equals publish order
    update_lock: Mutex<()>,
    store: Arc<dyn ConfigStore>,
    factory: ProviderFactory,
    supervisor: Arc<ProcessSupervisor>,
}

impl ControlPlaneService {
    /// Load the stored configuration and build its provider client.
    pub async fn new(
        store: Arc<dyn ConfigStore>,
        factory: ProviderFactory,
        supervisor: Arc<ProcessSupervisor>,
    ) -> Result<Self> {
        let config = store.load().await?;
        let provider = factory.create_provider(&config.llm)?;
        info!(
            "Control plane ready: {} workers defined, provider {}",
            config.workers.len(),
            provider.provider_name()
        );
        Ok(Self::with_state(config, provider, store, factory, supervisor))
    }

    /// Assemble a service around an already-built provider client.
    pub fn with_state(
        config: BackendConfiguration,
        provider: Arc<dyn LLMProvider>,
        store: Arc<dyn ConfigStore>,
        factory: ProviderFactory,
        supervisor: Arc<ProcessSupervisor>,
    ) -> Self {
        Self {
            state: RwLock::new(Arc::new(ActiveState { config, provider })),
            update_lock: Mutex::new(()),
            store,
            factory,
            supervisor,
        }
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    /// Consistent (configuration, provider) pair
    pub async fn snapshot(&self) -> Arc<ActiveState> {
        self.state.read().await.clone()
    }

    pub async fn get_config(&self) -> BackendConfiguration {
        self.snapshot().await.config.clone()
    }

    /// Persist `config` and hot-swap the provider client built from it.
    ///
    /// The client is built first and the document persisted second; the
    /// pair is published only when both succeed, so on any failure the
    /// previous configuration and client stay active.
    pub async fn update_config(&self, config: BackendConfiguration) -> Result<BackendConfiguration> {
        config.validate()?;

        let _guard = self.update_lock.lock().await;
        let provider = self.factory.create_provider(&config.llm)?;
        self.store.save(&config).await?;

        let next = Arc::new(ActiveState {
            config: config.clone(),
            provider,
        });
        *self.state.write().await = next;

        info!(
            "Configuration updated: {} workers, provider {} ({})",
            config.workers.len(),
            config.llm.discriminator(),
            config.llm.default_model()
        );
        Ok(config)
    }

    /// Aggregated generation: the first chunk of the sequence.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationChunk> {
        let span = info_span!("generation", request_id = %Uuid::new_v4(), streaming = false);
        async move {
            let provider = self.snapshot().await.provider.clone();
            let mut chunks = provider.generate(request).await?;

            let chunk = match chunks.next().await {
                Some(chunk) => chunk?,
                None => {
                    return Err(LLMError::EmptyResponse(
                        "upstream produced no chunks".to_string(),
                    )
                    .into());
                }
            };
            if !chunk.is_final {
                debug!("Aggregated response keeps the first chunk; dropping the rest");
            }
            Ok::<_, ControlError>(chunk)
        }
        .instrument(span)
        .await
    }

    /// Streaming generation on the provider active when the call starts.
    pub async fn generate_stream(&self, request: GenerationRequest) -> Result<ChunkStream> {
        let request_id = Uuid::new_v4();
        let span = info_span!("generation", request_id = %request_id, streaming = true);
        async move {
            let provider = self.snapshot().await.provider.clone();
            debug!("Opening stream on {}", provider.provider_name());
            let chunks = provider.generate(request).await?;
            Ok::<_, ControlError>(chunks)
        }
        .instrument(span)
        .await
    }

    pub async fn list_models(&self) -> Result<serde_json::Value> {
        let provider = self.snapshot().await.provider.clone();
        Ok(provider.list_models().await?)
    }

    pub async fn pull_model(&self, model_name: &str) -> Result<ProgressStream> {
        if model_name.trim().is_empty() {
            return Err(ControlError::InvalidRequest(
                "model name must not be empty".to_string(),
            ));
        }
        let provider = self.snapshot().await.provider.clone();
        info!("Pulling model {} via {}", model_name, provider.provider_name());
        Ok(provider.pull_model(model_name.to_string()).await?)
    }

    /// Probe the active provider; unreachable is reported, not an error.
    pub async fn provider_status(&self) -> ProviderStatusReport {
        let provider = self.snapshot().await.provider.clone();
        let (status, message) = match provider.health_check().await {
            Ok(()) => (
                ProviderState::Running,
                format!("{} is reachable", provider.provider_name()),
            ),
            Err(e) => (ProviderState::Stopped, e.to_string()),
        };
        ProviderStatusReport {
            status,
            provider: provider.provider_name().to_string(),
            default_model: provider.default_model().to_string(),
            endpoint: provider.endpoint().to_string(),
            message,
        }
    }

    /// Probe the active provider, failing when it cannot be reached.
    ///
    /// The provider runs outside this service; there is nothing to launch.
    pub async fn ensure_provider_reachable(&self) -> Result<ProviderStatusReport> {
        let provider = self.snapshot().await.provider.clone();
        provider.health_check().await?;
        Ok(ProviderStatusReport {
            status: ProviderState::Running,
            provider: provider.provider_name().to_string(),
            default_model: provider.default_model().to_string(),
            endpoint: provider.endpoint().to_string(),
            message: format!("{} is reachable", provider.provider_name()),
        })
    }

    /// Launch the worker defined under `name`; returns its pid.
    pub async fn start_worker(&self, name: &str) -> Result<u32> {
        let snapshot = self.snapshot().await;
        let definition = snapshot
            .config
            .worker(name)
            .ok_or_else(|| ControlError::WorkerNotDefined(name.to_string()))?;

        let command = launch_command(definition);
        self.supervisor
            .launch(name, command)?
            .ok_or_else(|| ControlError::WorkerAlreadyRunning(name.to_string()))
    }

    pub async fn stop_worker(&self, name: &str) -> Result<()> {
        if !self.supervisor.stop(name).await? {
            return Err(ControlError::WorkerNotRunning(name.to_string()));
        }
        Ok(())
    }

    /// Stop every live worker; returns the names actually stopped.
    pub async fn stop_all_workers(&self) -> Result<Vec<String>> {
        let supervisor = self.supervisor.clone();
        tokio::spawn(async move { supervisor.stop_all().await })
            .await
            .map_err(|e| ControlError::Task(e.to_string()))
    }

    pub fn worker_status(&self, name: &str) -> ProcessStatus {
        self.supervisor.status(name)
    }

    /// Status of every configured worker, in configuration order.
    pub async fn all_worker_statuses(&self) -> Vec<WorkerStatusReport> {
        let snapshot = self.snapshot().await;
        snapshot
            .config
            .workers
            .iter()
            .map(|worker| WorkerStatusReport {
                name: worker.name.clone(),
                status: self.supervisor.status(&worker.name),
                pid: self.supervisor.pid(&worker.name),
            })
            .collect()
    }

    pub fn running_workers(&self) -> BTreeMap<String, u32> {
        self.supervisor.list_running()
    }

    /// Stop all workers before the process exits.
    pub async fn shutdown(&self) -> Vec<String> {
        info!("Shutting down; stopping all workers");
        match self.stop_all_workers().await {
            Ok(stopped) => stopped,
            Err(e) => {
                warn!("Failed to stop workers during shutdown: {}", e);
                Vec::new()
            }
        }
    }
}
