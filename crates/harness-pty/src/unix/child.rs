//! Unix child process management for PTY sessions.
//!
//! Spawns the child on the slave side of a PTY as a session leader with the
//! slave as its controlling terminal, and provides the signalling and reaping
//! the harness relies on for cleanup.

use std::ffi::OsStr;
use std::io;
use std::os::unix::io::OwnedFd;
use std::process::Stdio;
use std::time::Duration;

use rustix::io::{Errno, fcntl_dupfd_cloexec};
use rustix::process::{
    Pid, Signal, WaitId, WaitIdOptions, kill_process, kill_process_group, waitid,
};
use tokio::process::{Child as TokioChild, Command};

use crate::config::{PtyConfig, PtySignal};
use crate::error::{PtyError, Result, os_error};
use crate::status::ExitStatus;

/// How often `terminate` checks whether the child has exited.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Unix child process handle.
pub struct UnixPtyChild {
    child: TokioChild,
    pid: u32,
    /// Whether the child leads its own process group.
    group_leader: bool,
    exit_status: Option<ExitStatus>,
}

impl std::fmt::Debug for UnixPtyChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyChild")
            .field("pid", &self.pid)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

impl UnixPtyChild {
    /// Wrap a freshly spawned tokio child.
    pub fn new(child: TokioChild, group_leader: bool) -> Result<Self> {
        let pid = child.id().ok_or_else(|| {
            PtyError::Spawn(io::Error::other("child exited before its pid was read"))
        })?;
        Ok(Self {
            child,
            pid,
            group_leader,
            exit_status: None,
        })
    }

    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the child was still running when last observed.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.exit_status.is_none()
    }

    /// Exit status, if the child has been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Wait for the child process to exit. The status is cached.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let status = ExitStatus::from(self.child.wait().await.map_err(PtyError::Wait)?);
        tracing::debug!(pid = self.pid, %status, "child exited");
        self.exit_status = Some(status);
        Ok(status)
    }

    /// Try to get the exit status without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }

        let status = self
            .child
            .try_wait()
            .map_err(PtyError::Wait)?
            .map(ExitStatus::from);
        if let Some(status) = status {
            tracing::debug!(pid = self.pid, %status, "child exited");
        }
        self.exit_status = status;
        Ok(status)
    }

    /// Send a signal to the child process.
    pub fn signal(&self, signal: PtySignal) -> Result<()> {
        match self.exit_status {
            Some(ExitStatus::Exited(code)) => return Err(PtyError::ProcessExited(code)),
            Some(ExitStatus::Signaled(sig)) => return Err(PtyError::ProcessSignaled(sig)),
            None => {}
        }
        signal_pid(self.pid, signal)
    }

    /// Kill the child process (`SIGKILL`), and its process group when it
    /// leads one. Does not reap.
    pub fn kill(&mut self) -> Result<()> {
        self.signal(PtySignal::Kill)?;
        if self.group_leader {
            ignore_missing(self.signal_group(PtySignal::Kill))?;
        }
        Ok(())
    }

    /// Stop the child: `SIGTERM`, wait up to `grace`, then `SIGKILL`, and reap.
    ///
    /// Signals go to the child's whole process group when it leads one, so
    /// descendants holding the slave open are stopped too. Calling this on an
    /// already reaped child returns the cached status.
    pub async fn terminate(&mut self, grace: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.try_wait()? {
            return Ok(status);
        }

        self.signal_tree(PtySignal::Terminate)?;
        if self.exited_within(grace).await? {
            if self.group_leader {
                // Stragglers in the group would keep the slave open. The
                // unreaped leader keeps the group id from being reused.
                ignore_missing(self.signal_group(PtySignal::Kill))?;
            }
        } else {
            tracing::warn!(pid = self.pid, ?grace, "child ignored SIGTERM, sending SIGKILL");
            self.signal_tree(PtySignal::Kill)?;
        }
        self.wait().await
    }

    /// Wait up to `grace` for the child to exit, leaving it unreaped.
    async fn exited_within(&self, grace: Duration) -> Result<bool> {
        let pid = resolve_pid(self.pid)?;
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            match waitid(
                WaitId::Pid(pid),
                WaitIdOptions::EXITED | WaitIdOptions::NOHANG | WaitIdOptions::NOWAIT,
            ) {
                Ok(Some(_)) => return Ok(true),
                Ok(None) => {}
                // Already reaped.
                Err(Errno::CHILD) => return Ok(true),
                Err(e) => return Err(PtyError::Wait(os_error(e))),
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    fn signal_tree(&self, signal: PtySignal) -> Result<()> {
        ignore_missing(signal_pid(self.pid, signal))?;
        if self.group_leader {
            ignore_missing(self.signal_group(signal))?;
        }
        Ok(())
    }

    fn signal_group(&self, signal: PtySignal) -> Result<()> {
        signal_process_group(self.pid, signal)
    }
}

/// Send `signal` to the process `pid`.
///
/// Usable from contexts that only know the pid, such as a signal watcher.
pub fn signal_pid(pid: u32, signal: PtySignal) -> Result<()> {
    let (pid, signal) = resolve(pid, signal)?;
    kill_process(pid, signal).map_err(|e| PtyError::Signal(os_error(e)))
}

/// Send `signal` to every process in the process group led by `pid`.
pub fn signal_process_group(pid: u32, signal: PtySignal) -> Result<()> {
    let (pid, signal) = resolve(pid, signal)?;
    kill_process_group(pid, signal).map_err(|e| PtyError::Signal(os_error(e)))
}

fn resolve_pid(pid: u32) -> Result<Pid> {
    i32::try_from(pid)
        .ok()
        .and_then(Pid::from_raw)
        .ok_or_else(|| PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid")))
}

fn resolve(pid: u32, signal: PtySignal) -> Result<(Pid, Signal)> {
    let pid = resolve_pid(pid)?;
    let signal = Signal::from_named_raw(signal.as_unix_signal()).ok_or_else(|| {
        PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid signal"))
    })?;
    Ok((pid, signal))
}

/// A process that is already gone needs no signal.
fn ignore_missing(result: Result<()>) -> Result<()> {
    match result {
        Err(PtyError::Signal(e)) if e.raw_os_error() == Some(libc::ESRCH) => Ok(()),
        other => other,
    }
}

/// Spawn a child process with its stdio on the PTY slave.
///
/// The child runs in a new session with the slave as controlling terminal.
/// On Linux it also receives `SIGKILL` when the spawning thread exits, so an
/// abruptly killed harness does not leave it behind.
pub fn spawn_child<S, I>(
    slave_fd: OwnedFd,
    program: S,
    args: I,
    config: &PtyConfig,
) -> Result<UnixPtyChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let mut cmd = Command::new(program.as_ref());
    cmd.args(args);
    cmd.env_clear();
    cmd.envs(config.effective_env());
    cmd.kill_on_drop(true);

    if let Some(ref dir) = config.working_directory {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::from(dup_cloexec(&slave_fd)?));
    cmd.stdout(Stdio::from(dup_cloexec(&slave_fd)?));
    cmd.stderr(Stdio::from(dup_cloexec(&slave_fd)?));

    let new_session = config.new_session;
    let controlling_terminal = config.new_session && config.controlling_terminal;
    let die_with_parent = config.die_with_parent;

    // SAFETY: the closure only makes async-signal-safe syscalls and does not
    // allocate. Stdio is already on fds 0-2 when it runs.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(move || {
            if new_session && libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }

            if controlling_terminal && libc::ioctl(0, libc::TIOCSCTTY, 0) == -1 {
                return Err(io::Error::last_os_error());
            }

            #[cfg(target_os = "linux")]
            if die_with_parent && libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(io::Error::last_os_error());
            }
            #[cfg(not(target_os = "linux"))]
            let _ = die_with_parent;

            Ok(())
        });
    }

    let child = cmd.spawn().map_err(PtyError::Spawn)?;
    drop(slave_fd);

    UnixPtyChild::new(child, new_session)
}

fn dup_cloexec(fd: &OwnedFd) -> Result<OwnedFd> {
    fcntl_dupfd_cloexec(fd, 0).map_err(|e| PtyError::Create(os_error(e)))
}
