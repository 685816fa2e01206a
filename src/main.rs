use anyhow::{Context, Result};
use local_llm_backend::cli::{Args, ExecutionMode, ServeConfig, load_settings};
use local_llm_backend::config::{ConfigStore, JsonFileConfigStore, ServiceSettings, SettingsDiscovery};
use local_llm_backend::control::ControlPlaneService;
use local_llm_backend::llm::ProviderFactory;
use local_llm_backend::server;
use local_llm_backend::supervisor::ProcessSupervisor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("local_llm_backend=info")),
        )
        .init();

    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match mode {
        ExecutionMode::Serve(config) => run_serve(config).await,
        ExecutionMode::ShowConfig { settings } => show_config(settings).await,
        ExecutionMode::InitConfig { settings } => init_config(settings).await,
    }
}

async fn run_serve(overrides: ServeConfig) -> Result<()> {
    let (mut settings, source) = load_settings(overrides.settings.as_ref())?;
    overrides.apply(&mut settings);
    if let Some(path) = source {
        info!("Using settings from {:?}", path);
    }

    let config_path = settings.resolved_config_path();
    info!("Backend configuration: {:?}", config_path);

    let factory = ProviderFactory::new(settings.connect_timeout())?;
    let supervisor = Arc::new(ProcessSupervisor::new(settings.supervisor_config()));
    let store = Arc::new(JsonFileConfigStore::new(config_path));
    let service = Arc::new(
        ControlPlaneService::new(store, factory, supervisor)
            .await
            .context("failed to initialize control plane")?,
    );

    let handle = server::serve(service.clone(), &settings.bind_address).await?;
    info!("Local LLM backend listening on {}", handle.base_url());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Ctrl-C received, shutting down");

    let stopped = service.shutdown().await;
    if !stopped.is_empty() {
        info!("Stopped workers: {}", stopped.join(", "));
    }
    if let Err(e) = handle.shutdown().await {
        warn!("HTTP server did not shut down cleanly: {}", e);
    }
    Ok(())
}

async fn show_config(explicit: Option<PathBuf>) -> Result<()> {
    SettingsDiscovery::show_discovery_info();

    let (settings, _) = load_settings(explicit.as_ref())?;
    println!();
    println!("Effective settings:");
    println!("{}", toml::to_string_pretty(&settings)?);

    let store = JsonFileConfigStore::new(settings.resolved_config_path());
    let config = store.load().await?;
    println!("Backend configuration ({:?}):", store.path());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn init_config(explicit: Option<PathBuf>) -> Result<()> {
    let settings_path = match explicit {
        Some(path) => {
            if path.exists() {
                println!("Settings file already exists: {:?}", path);
            } else {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                ServiceSettings::default().to_toml_file(&path)?;
                println!("Created settings file: {:?}", path);
            }
            path
        }
        None => {
            let path = SettingsDiscovery::create_default_user_settings()?;
            println!("Settings file: {:?}", path);
            path
        }
    };

    let settings = ServiceSettings::from_toml_file(&settings_path)?;
    let store = JsonFileConfigStore::new(settings.resolved_config_path());
    if store.init_default().await? {
        println!("Created backend configuration: {:?}", store.path());
    } else {
        println!("Backend configuration already exists: {:?}", store.path());
    }
    Ok(())
}
