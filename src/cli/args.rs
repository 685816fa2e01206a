//! Command line argument parsing
//!
//! Subcommands:
//! - `serve`: Run the HTTP control plane until Ctrl-C
//! - `show-config`: Show settings discovery and the effective backend configuration
//! - `init-config`: Write default settings and backend configuration if absent

use crate::config::{ConfigError, ServiceSettings, SettingsDiscovery};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Serve(ServeConfig),
    ShowConfig { settings: Option<PathBuf> },
    InitConfig { settings: Option<PathBuf> },
}

/// Overrides for `serve`; anything unset comes from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeConfig {
    pub bind: Option<String>,
    pub config: Option<PathBuf>,
    pub settings: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
}

impl ServeConfig {
    /// Apply command line overrides on top of `settings`.
    pub fn apply(&self, settings: &mut ServiceSettings) {
        if let Some(ref bind) = self.bind {
            settings.bind_address = bind.clone();
        }
        if let Some(ref config) = self.config {
            settings.config_path = Some(config.clone());
        }
        if let Some(ref log_dir) = self.log_dir {
            settings.log_dir = Some(log_dir.clone());
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "local-llm-backend")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local control plane for worker processes and LLM providers")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP control plane
    Serve {
        /// Address to listen on (e.g. 127.0.0.1:8000)
        #[arg(short = 'b', long = "bind")]
        bind: Option<String>,
        /// Backend configuration document (JSON)
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Service settings file (TOML), bypassing discovery
        #[arg(short = 's', long = "settings")]
        settings: Option<PathBuf>,
        /// Directory receiving per-worker output logs
        #[arg(long = "log-dir")]
        log_dir: Option<PathBuf>,
    },
    /// Show settings discovery and the effective backend configuration
    ShowConfig {
        /// Service settings file (TOML), bypassing discovery
        #[arg(short = 's', long = "settings")]
        settings: Option<PathBuf>,
    },
    /// Write default settings and backend configuration if absent
    InitConfig {
        /// Where to write the settings file instead of ~/.local-llm/settings.toml
        #[arg(short = 's', long = "settings")]
        settings: Option<PathBuf>,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Serve {
                bind,
                config,
                settings,
                log_dir,
            }) => Ok(ExecutionMode::Serve(ServeConfig {
                bind: bind.clone(),
                config: config.clone(),
                settings: settings.clone(),
                log_dir: log_dir.clone(),
            })),
            Some(Commands::ShowConfig { settings }) => Ok(ExecutionMode::ShowConfig {
                settings: settings.clone(),
            }),
            Some(Commands::InitConfig { settings }) => Ok(ExecutionMode::InitConfig {
                settings: settings.clone(),
            }),
            None => Err(
                "No command specified. Use 'local-llm-backend --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}

/// Load settings from an explicit file, or through discovery.
pub fn load_settings(
    explicit: Option<&PathBuf>,
) -> Result<(ServiceSettings, Option<PathBuf>), ConfigError> {
    match explicit {
        Some(path) => Ok((ServiceSettings::from_toml_file(path)?, Some(path.clone()))),
        None => SettingsDiscovery::discover(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_command_with_overrides() {
        let args = Args::try_parse_from([
            "local-llm-backend",
            "serve",
            "--bind",
            "0.0.0.0:9000",
            "--config",
            "/tmp/config.json",
            "--log-dir",
            "/tmp/logs",
        ])
        .unwrap();

        let ExecutionMode::Serve(serve) = args.mode().unwrap() else {
            panic!("expected serve mode");
        };
        assert_eq!(serve.bind.as_deref(), Some("0.0.0.0:9000"));
        assert!(serve.settings.is_none());

        let mut settings = ServiceSettings::default();
        serve.apply(&mut settings);
        assert_eq!(settings.bind_address, "0.0.0.0:9000");
        assert_eq!(settings.config_path, Some(PathBuf::from("/tmp/config.json")));
        assert_eq!(settings.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_serve_without_overrides_keeps_settings() {
        let args = Args::try_parse_from(["local-llm-backend", "serve"]).unwrap();
        let ExecutionMode::Serve(serve) = args.mode().unwrap() else {
            panic!("expected serve mode");
        };
        assert_eq!(serve, ServeConfig::default());

        let mut settings = ServiceSettings::default();
        serve.apply(&mut settings);
        assert_eq!(settings, ServiceSettings::default());
    }

    #[test]
    fn test_show_and_init_config_commands() {
        let args = Args::try_parse_from(["local-llm-backend", "show-config"]).unwrap();
        assert!(matches!(
            args.mode().unwrap(),
            ExecutionMode::ShowConfig { settings: None }
        ));

        let args =
            Args::try_parse_from(["local-llm-backend", "init-config", "-s", "/tmp/s.toml"]).unwrap();
        assert!(matches!(
            args.mode().unwrap(),
            ExecutionMode::InitConfig { settings: Some(_) }
        ));
    }

    #[test]
    fn test_no_command_is_an_error() {
        let args = Args { command: None };
        assert!(args.mode().is_err());
    }
}
