//! Error types for the harness-pty crate.
//!
//! This module provides a unified error type [`PtyError`] that covers all
//! possible failure modes when working with pseudo-terminals.

use std::io;

/// The error type for PTY operations.
///
/// Covers PTY allocation, child spawning, master I/O and child process
/// control.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to create a new PTY.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// Failed to spawn a child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error occurred during PTY operations.
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to resize the PTY.
    #[error("failed to resize PTY: {0}")]
    Resize(#[source] io::Error),

    /// The PTY has been closed.
    #[error("PTY has been closed")]
    Closed,

    /// The child process has exited.
    #[error("child process exited with status: {0}")]
    ProcessExited(i32),

    /// The child process was killed by a signal.
    #[cfg(unix)]
    #[error("child process killed by signal: {0}")]
    ProcessSignaled(i32),

    /// Failed to send a signal to the child process.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// Failed to wait for the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),
}

/// A specialized Result type for PTY operations.
pub type Result<T> = std::result::Result<T, PtyError>;

#[cfg(unix)]
impl From<rustix::io::Errno> for PtyError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(os_error(errno))
    }
}

/// Convert a rustix errno into a `std::io::Error`.
#[cfg(unix)]
pub(crate) fn os_error(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PtyError::Closed;
        assert_eq!(err.to_string(), "PTY has been closed");
    }

    #[test]
    fn spawn_error_keeps_source_kind() {
        let err = PtyError::Spawn(io::Error::new(io::ErrorKind::NotFound, "no such file"));
        match err {
            PtyError::Spawn(source) => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let pty_err: PtyError = io_err.into();
        assert!(matches!(pty_err, PtyError::Io(_)));
    }
}
