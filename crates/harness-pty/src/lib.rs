//! harness-pty: async PTY primitives for the cush test harness
//!
//! This crate allocates pseudo-terminals, spawns a child process with the
//! slave side as its controlling terminal, and exposes the master side as a
//! Tokio `AsyncRead + AsyncWrite` handle. It also provides the child process
//! controls the harness needs to guarantee cleanup: signalling, reaping, a
//! bounded terminate-then-kill sequence, and a watcher that reacts to the
//! harness itself being interrupted.
//!
//! # Platform Support
//!
//! Unix only (Linux, macOS, the BSDs). PTY allocation and process control go
//! through `rustix`; async I/O goes through Tokio's `AsyncFd`.
//!
//! # Quick Start
//!
//! ```ignore
//! use harness_pty::PtyConfig;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PtyConfig::default();
//!     let (mut master, mut child) = harness_pty::spawn("/bin/cat", [""; 0], &config).await?;
//!
//!     master.write_all(b"hello\n").await?;
//!
//!     let mut buf = [0u8; 1024];
//!     let n = master.read(&mut buf).await?;
//!     println!("{}", String::from_utf8_lossy(&buf[..n]));
//!
//!     child.terminate(std::time::Duration::from_millis(200)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod status;

#[cfg(unix)]
pub mod unix;

// Re-export primary types
pub use config::{PtyConfig, PtyConfigBuilder, PtySignal, WindowSize};
pub use error::{PtyError, Result};
pub use status::ExitStatus;

#[cfg(unix)]
pub use unix::{
    TERMINATION_SIGNALS, TerminationWatcher, UnixPtyChild, UnixPtyMaster, exit_code_for_signal,
    signal_pid, signal_process_group, spawn, watch_termination,
};
