use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Child;

/// Command used to launch a supervised worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchCommand {
    /// Program name or path to execute
    pub program: String,
    /// Positional arguments passed to the program
    pub args: Vec<String>,
    /// Working directory for the child (None = inherit)
    pub working_dir: Option<PathBuf>,
}

impl LaunchCommand {
    /// Create a command with just program and args
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// Build a command from a full argument vector (program first).
    ///
    /// Returns `None` for an empty vector.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// Set the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Full argument vector, program first
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Shell-escaped command line, for logs only
    pub fn display(&self) -> String {
        self.argv()
            .into_iter()
            .map(|part| shell_escape::escape(Cow::Owned(part)).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Lifecycle of a tracked process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Spawned and not observed to exit
    Running,
    /// A stop request is terminating the process tree
    Stopping,
    /// Observed to have exited on its own
    Exited(Option<i32>),
}

/// Status reported for a logical worker name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessStatus {
    NotFound,
    Running,
    Stopped,
}

/// How a stop request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopOutcome {
    /// Exited within the grace period after the termination request
    Graceful,
    /// Force-killed after the grace period elapsed
    Forced,
}

/// A supervised process, exclusively owned by the process table.
#[derive(Debug)]
pub struct ProcessHandle {
    pub name: String,
    pub pid: u32,
    pub command: LaunchCommand,
    pub started_at: DateTime<Utc>,
    pub state: LifecycleState,
    /// Taken by the stopper while the entry is `Stopping`
    pub(crate) child: Option<Child>,
}

impl ProcessHandle {
    pub(crate) fn new(name: String, pid: u32, command: LaunchCommand, child: Child) -> Self {
        Self {
            name,
            pid,
            command,
            started_at: Utc::now(),
            state: LifecycleState::Running,
            child: Some(child),
        }
    }

    /// Re-poll the OS for liveness and record an observed exit.
    pub(crate) fn poll_alive(&mut self) -> bool {
        match self.state {
            LifecycleState::Stopping => return true,
            LifecycleState::Exited(_) => return false,
            LifecycleState::Running => {}
        }

        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.state = LifecycleState::Exited(status.code());
                false
            }
            Err(e) => {
                tracing::warn!("Failed to poll process {} (PID {}): {}", self.name, self.pid, e);
                self.state = LifecycleState::Exited(None);
                false
            }
        }
    }

    /// Serializable view of this handle
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            name: self.name.clone(),
            pid: self.pid,
            command: self.command.argv(),
            working_dir: self.command.working_dir.clone(),
            started_at: self.started_at,
            state: self.state,
        }
    }
}

/// Snapshot of a process handle that can leave the supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: u32,
    pub command: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub state: LifecycleState,
}

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Grace period between the termination request and the forced kill
    pub stop_timeout: Duration,
    /// Directory receiving `<name>.log` with each worker's stdout/stderr
    pub log_dir: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: crate::env::default_stop_timeout(),
            log_dir: None,
        }
    }
}

/// Supervisor errors
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Invalid launch request: {0}")]
    InvalidCommand(String),

    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to spawn '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare log sink for '{name}': {source}")]
    LogSink {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to terminate '{name}' (PID {pid}): {source}")]
    TerminationFailed {
        name: String,
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}
