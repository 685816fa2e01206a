//! Process-tree termination.
//!
//! Workers are spawned as the leader of their own process group, so on POSIX
//! systems the whole group is signalled and the worker's own children die with
//! it. Windows has no process groups in that sense; `taskkill /T` walks the
//! process tree instead. Callers only see the two operations below.

use std::io;

pub use imp::{force_kill, group_alive, request_termination};

#[cfg(unix)]
mod imp {
    use std::io;

    /// Ask the process tree led by `pid` to exit (SIGTERM to the group).
    pub async fn request_termination(pid: u32) -> io::Result<()> {
        signal_group(pid, libc::SIGTERM)
    }

    /// Kill the process tree led by `pid` immediately (SIGKILL to the group).
    pub async fn force_kill(pid: u32) -> io::Result<()> {
        signal_group(pid, libc::SIGKILL)
    }

    /// Whether any member of the group led by `pid` still exists.
    pub fn group_alive(pid: u32) -> bool {
        match signal_group(pid, 0) {
            Ok(()) => true,
            Err(e) => e.raw_os_error() == Some(libc::EPERM),
        }
    }

    fn signal_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
        let pgid = libc::pid_t::try_from(pid).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("PID {} out of range", pid))
        })?;

        // SAFETY: killpg takes plain integers and has no memory-safety
        // preconditions. The group id equals the pid assigned at spawn time.
        let rc = unsafe { libc::killpg(pgid, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::io;
    use tokio::process::Command;

    /// Ask the process tree rooted at `pid` to exit (`taskkill /T`).
    pub async fn request_termination(pid: u32) -> io::Result<()> {
        taskkill(pid, false).await
    }

    /// Kill the process tree rooted at `pid` immediately (`taskkill /F /T`).
    pub async fn force_kill(pid: u32) -> io::Result<()> {
        taskkill(pid, true).await
    }

    /// `taskkill /T` already walks the tree, so nothing is left to wait for.
    pub fn group_alive(_pid: u32) -> bool {
        false
    }

    async fn taskkill(pid: u32, force: bool) -> io::Result<()> {
        let mut cmd = Command::new("taskkill");
        if force {
            cmd.arg("/F");
        }
        cmd.args(["/T", "/PID", &pid.to_string()]);

        let output = cmd.output().await?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(io::Error::other(stderr.trim().to_string()))
        }
    }
}

/// Whether an error only says the target no longer exists.
pub fn is_already_gone(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        error.raw_os_error() == Some(libc::ESRCH)
    }
    #[cfg(not(unix))]
    {
        error.kind() == io::ErrorKind::NotFound
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_missing_group_reports_gone() {
        // PIDs near the top of the range are practically never allocated.
        let err = request_termination(i32::MAX as u32 - 1).await.unwrap_err();
        assert!(is_already_gone(&err));
    }

    #[test]
    fn test_missing_group_is_not_alive() {
        assert!(!group_alive(i32::MAX as u32 - 1));
        assert!(!group_alive(u32::MAX));
    }

    #[tokio::test]
    async fn test_pid_out_of_range() {
        let err = force_kill(u32::MAX).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
