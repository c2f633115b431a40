//! Session handle for interacting with the spawned shell.

use std::io;
use std::time::Duration;

use harness_pty::{ExitStatus, PtyError, UnixPtyChild, UnixPtyMaster};
use tokio::io::{AsyncWriteExt, WriteHalf};

use crate::config::{HarnessConfig, LineEnding};
use crate::error::{ExpectError, Result, SpawnError};
use crate::expect::{Accumulator, Matcher, Pattern};
use crate::types::{ControlChar, Match, SessionState};

/// How long to wait for the shell to be reaped once its output has ended.
const REAP_AFTER_EOF: Duration = Duration::from_millis(200);

/// A shell running on a PTY, with its output accumulated in the background.
pub struct Session {
    /// Write side of the PTY master. `None` once the session is closed.
    writer: Option<WriteHalf<UnixPtyMaster>>,
    /// The shell process.
    child: UnixPtyChild,
    /// Pattern matcher over accumulated output.
    matcher: Matcher,
    /// Background reader owning the read side of the master.
    accumulator: Accumulator,
    /// Current session state.
    state: SessionState,
    /// Appended by [`send_line`](Self::send_line).
    line_ending: LineEnding,
    /// Timeout for [`expect`](Self::expect).
    default_timeout: Duration,
    /// SIGTERM grace period for [`terminate`](Self::terminate).
    terminate_grace: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pid", &self.child.pid())
            .field("state", &self.state)
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl Session {
    /// Spawn the configured shell on a fresh PTY and start accumulating its output.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::Spawn`] if the shell cannot be started.
    /// - [`ExpectError::Io`] if the transcript file cannot be created.
    pub async fn spawn(config: &HarnessConfig) -> Result<Self> {
        if let Some(dir) = &config.working_dir {
            if !dir.is_dir() {
                return Err(SpawnError::Pty {
                    reason: format!("working directory {} does not exist", dir.display()),
                }
                .into());
            }
        }

        let transcript = match &config.transcript {
            Some(path) => Some(tokio::fs::File::create(path).await.map_err(|e| {
                ExpectError::io_context(format!("creating transcript {}", path.display()), e)
            })?),
            None => None,
        };

        let pty_config = config.to_pty_config();
        let (master, child) = harness_pty::spawn(&config.shell, &config.args, &pty_config)
            .await
            .map_err(|e| spawn_error(&config.shell, e))?;

        let (reader, writer) = tokio::io::split(master);
        let (accumulator, matcher) = Accumulator::start(reader, transcript);

        tracing::info!(pid = child.pid(), shell = %config.shell, args = ?config.args, "spawned shell");

        Ok(Self {
            writer: Some(writer),
            child,
            matcher,
            accumulator,
            state: SessionState::Running,
            line_ending: config.line_ending,
            default_timeout: config.timeout,
            terminate_grace: config.terminate_grace,
        })
    }

    /// Get the shell's process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.child.pid()
    }

    /// Get the current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Exit status of the shell, if it has been reaped.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.child.exit_status()
    }

    /// Timeout used by [`expect`](Self::expect).
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Everything the shell has printed so far.
    #[must_use]
    pub fn output(&self) -> String {
        self.accumulator.output()
    }

    /// Output not yet consumed by a match.
    #[must_use]
    pub fn unconsumed(&self) -> String {
        self.matcher.unconsumed()
    }

    /// Send bytes to the shell.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Write`] if the session is closed, the shell has
    /// exited, or the write fails.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.writer.is_none() {
            return Err(broken_pipe("session is closed".to_string()));
        }
        // A master whose slave has hung up still accepts writes on Linux.
        if let Some(status) = self.exited()? {
            return Err(broken_pipe(format!("shell has already {status}")));
        }
        let Some(writer) = self.writer.as_mut() else {
            return Err(broken_pipe("session is closed".to_string()));
        };

        writer
            .write_all(data)
            .await
            .map_err(|source| ExpectError::Write { source })?;
        writer
            .flush()
            .await
            .map_err(|source| ExpectError::Write { source })?;

        tracing::debug!(bytes = data.len(), data = ?String::from_utf8_lossy(data), "sent to shell");
        Ok(())
    }

    /// Send a string to the shell.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Write`] if the session is closed or the write fails.
    pub async fn send_str(&mut self, s: &str) -> Result<()> {
        self.send(s.as_bytes()).await
    }

    /// Send a line followed by the configured line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Write`] if the session is closed or the write fails.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending.as_bytes());
        self.send(&data).await
    }

    /// Send a control character.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Write`] if the session is closed or the write fails.
    pub async fn send_control(&mut self, ctrl: ControlChar) -> Result<()> {
        self.send(&[ctrl.as_byte()]).await
    }

    /// Wait for a pattern using the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout or EOF.
    pub async fn expect(&mut self, pattern: impl Into<Pattern>) -> Result<Match> {
        self.expect_timeout(pattern, self.default_timeout).await
    }

    /// Wait for a pattern with a specific timeout.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, EOF, or a zero timeout.
    pub async fn expect_timeout(&mut self, pattern: impl Into<Pattern>, timeout: Duration) -> Result<Match> {
        let pattern = pattern.into();

        match self.matcher.expect(&pattern, timeout).await {
            Ok(m) => {
                tracing::debug!(pattern = %pattern, range = ?m.range, "matched");
                Ok(m)
            }
            Err(e) if e.is_eof() => {
                let status = self.reap_after_eof().await;
                tracing::debug!(pattern = %pattern, ?status, "shell output ended before match");
                Err(e.with_exit_status(status))
            }
            Err(e) => {
                if e.is_timeout() {
                    tracing::debug!(pattern = %pattern, ?timeout, "timed out");
                }
                Err(e)
            }
        }
    }

    /// Wait for the shell's output to end and return what was left unconsumed.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Timeout`] if output is still open at the deadline.
    pub async fn expect_eof(&mut self, timeout: Duration) -> Result<String> {
        let rest = self.matcher.expect_eof(timeout).await?;
        let status = self.reap_after_eof().await;
        tracing::debug!(?status, "shell output ended");
        Ok(rest)
    }

    /// Stop the shell and release the PTY.
    ///
    /// Sends SIGTERM, escalates to SIGKILL after the grace period, reaps the
    /// shell, stops the accumulator and closes the master. Repeated calls
    /// return the status recorded by the first.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Io`] if the shell cannot be signalled or reaped.
    pub async fn terminate(&mut self) -> Result<Option<ExitStatus>> {
        if self.state.is_closed() {
            return Ok(self.child.exit_status());
        }

        let status = self.child.terminate(self.terminate_grace).await;
        self.accumulator.stop().await;
        self.writer = None;
        self.state = SessionState::Closed;

        let status = status.map_err(|e| ExpectError::io_context("terminating shell", pty_io(e)))?;
        tracing::info!(pid = self.child.pid(), %status, "shell terminated");
        Ok(Some(status))
    }

    /// Exit status of the shell if it is no longer running, reaping it if needed.
    fn exited(&mut self) -> Result<Option<ExitStatus>> {
        if let SessionState::Exited(status) = self.state {
            return Ok(Some(status));
        }
        let status = self
            .child
            .try_wait()
            .map_err(|e| ExpectError::io_context("checking shell status", pty_io(e)))?;
        if let Some(status) = status {
            if self.state.is_running() {
                self.state = SessionState::Exited(status);
            }
        }
        Ok(status)
    }

    async fn reap_after_eof(&mut self) -> Option<ExitStatus> {
        if let Some(status) = self.child.exit_status() {
            return Some(status);
        }
        match tokio::time::timeout(REAP_AFTER_EOF, self.child.wait()).await {
            Ok(Ok(status)) => {
                if self.state.is_running() {
                    self.state = SessionState::Exited(status);
                }
                Some(status)
            }
            _ => None,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.state.is_closed() && self.child.is_running() {
            // Best effort; the child is also killed when its handle drops.
            let _ = self.child.kill();
        }
    }
}

fn spawn_error(command: &str, error: PtyError) -> ExpectError {
    match error {
        PtyError::Spawn(source) => SpawnError::from_io(command, &source).into(),
        other => SpawnError::from(other).into(),
    }
}

fn broken_pipe(reason: String) -> ExpectError {
    ExpectError::Write {
        source: io::Error::new(io::ErrorKind::BrokenPipe, reason),
    }
}

fn pty_io(error: PtyError) -> io::Error {
    match error {
        PtyError::Io(source) => source,
        other => io::Error::other(other),
    }
}
