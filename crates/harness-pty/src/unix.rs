//! Unix platform implementation for PTY operations.
//!
//! - PTY master/slave pair allocation via openpt/grantpt/unlockpt
//! - Async I/O through tokio's `AsyncFd`
//! - Child process spawning with a new session and controlling terminal
//! - Termination signal watching for the harness process

mod child;
mod pty;
mod signals;

use std::ffi::OsStr;

pub use child::{UnixPtyChild, signal_pid, signal_process_group, spawn_child};
pub use pty::{UnixPtyMaster, open_slave};
pub use signals::{TERMINATION_SIGNALS, TerminationWatcher, exit_code_for_signal, watch_termination};

use crate::config::PtyConfig;
use crate::error::Result;

/// Spawn `program` with `args` on a new PTY.
///
/// Returns the master side and the child handle. The parent's copy of the
/// slave is closed before returning, so only the child holds it.
pub async fn spawn<S, I>(program: S, args: I, config: &PtyConfig) -> Result<(UnixPtyMaster, UnixPtyChild)>
where
    S: AsRef<OsStr> + Send,
    I: IntoIterator + Send,
    I::Item: AsRef<OsStr>,
{
    let (master, slave_path) = UnixPtyMaster::open()?;
    master.set_window_size(config.window_size.into())?;

    // Dropped at the end of this scope; the child keeps its own copies.
    let slave_fd = open_slave(&slave_path)?;
    let child = spawn_child(slave_fd, program, args, config)?;

    tracing::debug!(pid = child.pid(), slave = %slave_path, "spawned child in PTY");
    Ok((master, child))
}
