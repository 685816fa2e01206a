use super::terminate;
use super::types::{
    LaunchCommand, LifecycleState, ProcessHandle, ProcessInfo, ProcessStatus, StopOutcome,
    SupervisorConfig, SupervisorError,
};
use crate::env;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub type Result<T> = std::result::Result<T, SupervisorError>;

type ProcessTable = Mutex<HashMap<String, ProcessHandle>>;

/// Upper bound for reaping a child after a failed termination request.
const REAP_GRACE: Duration = Duration::from_secs(1);

/// How often a stop re-checks a group whose leader already exited.
const GROUP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Owns the process table and is the only component allowed to spawn or
/// kill worker processes.
///
/// The table lock is only held for short, non-blocking sections (spawn,
/// liveness polls, bookkeeping), never while waiting for a child to exit.
pub struct ProcessSupervisor {
    table: Arc<ProcessTable>,
    config: SupervisorConfig,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, ProcessHandle>> {
        lock_table(&self.table)
    }

    /// Launch `command` under the logical `name`.
    ///
    /// Returns `Ok(false)` without spawning when a live process is already
    /// tracked under `name`. An entry whose process exited on its own is
    /// replaced. Nothing is recorded when spawning fails.
    pub fn start(&self, name: &str, command: LaunchCommand) -> Result<bool> {
        Ok(self.launch(name, command)?.is_some())
    }

    /// Same as [`start`](Self::start), returning the PID recorded for the
    /// new process, or `None` when `name` was already running.
    pub fn launch(&self, name: &str, command: LaunchCommand) -> Result<Option<u32>> {
        if name.trim().is_empty() {
            return Err(SupervisorError::InvalidCommand(
                "process name must not be empty".to_string(),
            ));
        }
        if !env::is_valid_worker_name(name) {
            return Err(SupervisorError::InvalidCommand(format!(
                "process name '{}' must not contain path separators or be a relative path component",
                name
            )));
        }
        if command.program.trim().is_empty() {
            return Err(SupervisorError::InvalidCommand(format!(
                "empty command for '{}'",
                name
            )));
        }

        let program = resolve_program(&command.program)?;

        let mut table = self.table();

        if let Some(existing) = table.get_mut(name) {
            if existing.poll_alive() {
                info!(
                    "Process {} is already running (PID {})",
                    name, existing.pid
                );
                return Ok(None);
            }
            debug!("Replacing exited entry for process {}", name);
            table.remove(name);
        }

        let (stdout, stderr) = self.output_sinks(name, &command)?;

        let mut cmd = Command::new(&program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }
        isolate_process_group(&mut cmd);

        let child = cmd.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SupervisorError::ExecutableNotFound(command.program.clone())
            } else {
                SupervisorError::SpawnFailed {
                    name: name.to_string(),
                    source,
                }
            }
        })?;

        let Some(pid) = child.id() else {
            return Err(SupervisorError::SpawnFailed {
                name: name.to_string(),
                source: io::Error::other("process exited before its PID could be read"),
            });
        };

        info!(
            "Process {} started with PID {}: {}",
            name,
            pid,
            command.display()
        );
        table.insert(
            name.to_string(),
            ProcessHandle::new(name.to_string(), pid, command, child),
        );

        Ok(Some(pid))
    }

    /// Stop the process tracked under `name`.
    ///
    /// Requests termination of the whole process tree, waits up to the
    /// configured stop timeout and force-kills whatever is left of the
    /// group afterwards. Returns `Ok(false)` when nothing live is tracked
    /// under `name`. The entry is purged even when termination fails; the
    /// failure is still reported.
    ///
    /// Termination runs on its own task: dropping this future does not
    /// interrupt it, and the entry is purged once the tree is gone.
    pub async fn stop(&self, name: &str) -> Result<bool> {
        let (pid, child) = {
            let mut table = self.table();

            let Some(handle) = table.get_mut(name) else {
                info!("Process {} is not running", name);
                return Ok(false);
            };

            if handle.state == LifecycleState::Stopping {
                info!("Process {} is already being stopped", name);
                return Ok(false);
            }

            if !handle.poll_alive() {
                info!("Process {} already exited; removing stale entry", name);
                table.remove(name);
                return Ok(false);
            }

            let Some(child) = handle.child.take() else {
                table.remove(name);
                return Ok(false);
            };

            handle.state = LifecycleState::Stopping;
            (handle.pid, child)
        };

        let table = Arc::clone(&self.table);
        let owned = name.to_string();
        let stop_timeout = self.config.stop_timeout;
        let task = tokio::spawn(async move {
            let result = terminate_tree(&owned, pid, child, stop_timeout).await;
            release_entry(&table, &owned, pid);
            report_stop(&owned, pid, result)
        });

        task.await.map_err(|e| SupervisorError::TerminationFailed {
            name: name.to_string(),
            pid,
            source: io::Error::other(e.to_string()),
        })?
    }

    /// Report the liveness of `name`, re-polling the OS.
    ///
    /// A process that died on its own is reported as `Stopped`; its entry is
    /// kept until the next `start`, `stop` or `list_running` for it.
    pub fn status(&self, name: &str) -> ProcessStatus {
        let mut table = self.table();
        match table.get_mut(name) {
            None => ProcessStatus::NotFound,
            Some(handle) => {
                if handle.poll_alive() {
                    ProcessStatus::Running
                } else {
                    ProcessStatus::Stopped
                }
            }
        }
    }

    /// Stop every live process and return the names actually stopped.
    pub async fn stop_all(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table().keys().cloned().collect();
        names.sort();

        let mut stopped = Vec::new();
        for name in names {
            match self.stop(&name).await {
                Ok(true) => stopped.push(name),
                Ok(false) => {}
                Err(e) => warn!("Failed to stop {} during stop-all: {}", name, e),
            }
        }
        stopped
    }

    /// Live processes by name, reaping entries whose process already exited.
    pub fn list_running(&self) -> BTreeMap<String, u32> {
        let mut table = self.table();
        table.retain(|name, handle| {
            let alive = handle.poll_alive();
            if !alive {
                debug!("Reaping exited process {} (PID {})", name, handle.pid);
            }
            alive
        });
        table
            .iter()
            .map(|(name, handle)| (name.clone(), handle.pid))
            .collect()
    }

    /// OS process id of a live process
    pub fn pid(&self, name: &str) -> Option<u32> {
        let mut table = self.table();
        let handle = table.get_mut(name)?;
        handle.poll_alive().then_some(handle.pid)
    }

    /// Snapshot of the handle tracked under `name`, if any
    pub fn info(&self, name: &str) -> Option<ProcessInfo> {
        let mut table = self.table();
        let handle = table.get_mut(name)?;
        handle.poll_alive();
        Some(handle.info())
    }

    fn output_sinks(&self, name: &str, command: &LaunchCommand) -> Result<(Stdio, Stdio)> {
        let Some(ref log_dir) = self.config.log_dir else {
            return Ok((Stdio::null(), Stdio::null()));
        };

        let sink_error = |source| SupervisorError::LogSink {
            name: name.to_string(),
            source,
        };

        fs::create_dir_all(log_dir).map_err(sink_error)?;
        let path = env::worker_log_file_path(log_dir, name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(sink_error)?;

        writeln!(
            file,
            "=== [{}] starting: {} ===",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            command.display()
        )
        .map_err(sink_error)?;

        let stderr = file.try_clone().map_err(sink_error)?;
        debug!("Process {} output goes to {}", name, path.display());
        Ok((Stdio::from(file), Stdio::from(stderr)))
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

fn lock_table(table: &ProcessTable) -> MutexGuard<'_, HashMap<String, ProcessHandle>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drop the `Stopping` entry left by the stop of `pid`.
fn release_entry(table: &ProcessTable, name: &str, pid: u32) {
    let mut table = lock_table(table);
    let owned_by_stop = table
        .get(name)
        .is_some_and(|handle| handle.pid == pid && handle.state == LifecycleState::Stopping);
    if owned_by_stop {
        table.remove(name);
    }
}

fn report_stop(name: &str, pid: u32, result: io::Result<StopOutcome>) -> Result<bool> {
    match result {
        Ok(StopOutcome::Graceful) => {
            info!("Process {} with PID {} stopped", name, pid);
            Ok(true)
        }
        Ok(StopOutcome::Forced) => {
            warn!("Process {} with PID {} was force-killed", name, pid);
            Ok(true)
        }
        Err(source) => {
            if terminate::is_already_gone(&source) {
                warn!("Process {} (PID {}) vanished while stopping", name, pid);
            } else {
                error!("Error stopping process {} (PID {}): {}", name, pid, source);
            }
            Err(SupervisorError::TerminationFailed {
                name: name.to_string(),
                pid,
                source,
            })
        }
    }
}

/// Terminate the group led by `pid` and reap its leader.
///
/// The stop is graceful only when the whole group is gone before the
/// deadline; descendants that outlive the leader are force-killed.
async fn terminate_tree(
    name: &str,
    pid: u32,
    mut child: Child,
    stop_timeout: Duration,
) -> io::Result<StopOutcome> {
    if let Err(e) = terminate::request_termination(pid).await {
        // Reap the direct child so no zombie outlives the entry.
        let _ = tokio::time::timeout(REAP_GRACE, child.kill()).await;
        return Err(e);
    }

    let deadline = Instant::now() + stop_timeout;
    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => {
            debug!("Process {} exited with {:?}", name, status?);
            if wait_for_group_exit(pid, deadline).await {
                return Ok(StopOutcome::Graceful);
            }
            warn!(
                "Process group of {} (PID {}) outlived its leader by {:?}; killing it",
                name, pid, stop_timeout
            );
            kill_group(pid).await?;
            Ok(StopOutcome::Forced)
        }
        Err(_) => {
            warn!(
                "Process {} (PID {}) did not exit within {:?}; killing process tree",
                name, pid, stop_timeout
            );
            kill_group(pid).await?;
            child.wait().await?;
            Ok(StopOutcome::Forced)
        }
    }
}

async fn wait_for_group_exit(pid: u32, deadline: Instant) -> bool {
    loop {
        if !terminate::group_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(GROUP_POLL_INTERVAL).await;
    }
}

async fn kill_group(pid: u32) -> io::Result<()> {
    match terminate::force_kill(pid).await {
        Err(e) if !terminate::is_already_gone(&e) => Err(e),
        _ => Ok(()),
    }
}

/// Resolve bare program names through `PATH`; paths are used as given.
fn resolve_program(program: &str) -> Result<PathBuf> {
    let path = PathBuf::from(program);
    if path.components().count() > 1 || path.is_absolute() {
        return Ok(path);
    }
    which::which(program).map_err(|_| SupervisorError::ExecutableNotFound(program.to_string()))
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(windows)]
fn isolate_process_group(cmd: &mut Command) {
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}
