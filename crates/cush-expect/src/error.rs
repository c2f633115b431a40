//! Error types for cush-expect.
//!
//! Every failure a test script can hit is one [`ExpectError`] variant. Timeout
//! and EOF errors carry the awaited pattern and the unmatched output so the
//! diagnostic shows what the shell actually printed. [`TestFailure`] pairs an
//! error with the failure message the script supplied.

use std::time::Duration;

use harness_pty::ExitStatus;
use thiserror::Error;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Context lines to show before/after truncation point.
const CONTEXT_LINES: usize = 3;

/// Format buffer content for display, truncating if necessary.
pub(crate) fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(no unmatched output)".to_string();
    }

    let buffer_len = buffer.len();
    let lines: Vec<&str> = buffer.lines().collect();
    let total_lines = lines.len();

    if buffer_len <= MAX_BUFFER_DISPLAY || total_lines <= CONTEXT_LINES * 2 {
        let shown = if buffer_len <= MAX_BUFFER_DISPLAY {
            lines
        } else {
            // Few but long lines: keep the last MAX_BUFFER_DISPLAY bytes.
            let mut start = buffer_len - MAX_BUFFER_DISPLAY;
            while !buffer.is_char_boundary(start) {
                start += 1;
            }
            buffer[start..].lines().collect()
        };
        return format!(
            "┌─ unmatched output ({buffer_len} bytes) ─────────────\n│ {}\n└────────────────────────────────────────",
            shown.join("\n│ ")
        );
    }

    let tail_lines = &lines[total_lines - CONTEXT_LINES * 2..];
    let hidden = total_lines - tail_lines.len();

    format!(
        "┌─ unmatched output ({buffer_len} bytes, {total_lines} lines) ─────────────\n│ ... ({hidden} lines hidden)\n│ {}\n└────────────────────────────────────────",
        tail_lines.join("\n│ ")
    )
}

fn format_timeout_error(elapsed: Duration, pattern: &str, buffer: &str) -> String {
    format!(
        "timed out after {elapsed:.2?} waiting for {pattern:?}\n{}",
        format_buffer_snippet(buffer)
    )
}

fn format_eof_error(pattern: &str, buffer: &str, exit_status: Option<&ExitStatus>) -> String {
    let status = exit_status.map_or_else(|| "exit status unknown".to_string(), ToString::to_string);
    format!(
        "shell closed its output ({status}) before {pattern:?} appeared\n{}",
        format_buffer_snippet(buffer)
    )
}

/// The main error type for harness operations.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// The shell could not be started.
    #[error("failed to spawn shell: {0}")]
    Spawn(#[from] SpawnError),

    /// Writing to the shell failed: the session is closed or the child is gone.
    #[error("failed to write to shell: {source}")]
    Write {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The pattern was not observed within the allotted time.
    #[error("{}", format_timeout_error(*elapsed, pattern, buffer))]
    Timeout {
        /// The pattern that was being searched for.
        pattern: String,
        /// Time spent waiting.
        elapsed: Duration,
        /// Unmatched output at the time of the timeout.
        buffer: String,
    },

    /// The shell's output ended before the pattern appeared.
    #[error("{}", format_eof_error(pattern, buffer, exit_status.as_ref()))]
    Eof {
        /// The pattern that was being searched for.
        pattern: String,
        /// Unmatched output when the stream ended.
        buffer: String,
        /// The child's exit status, if it had been reaped.
        exit_status: Option<ExitStatus>,
    },

    /// The harness was used incorrectly or the run ended without success.
    #[error("assertion failed: {message}")]
    Assertion {
        /// What went wrong.
        message: String,
    },

    /// Invalid regex pattern.
    #[error("invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    Io {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Errors related to starting the shell.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The executable does not exist.
    #[error("command not found: {command}")]
    CommandNotFound {
        /// The command that was not found.
        command: String,
    },

    /// The executable exists but cannot be executed.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be executed.
        path: String,
    },

    /// PTY allocation or child setup failed.
    #[error("failed to set up PTY: {reason}")]
    Pty {
        /// The reason for the failure.
        reason: String,
    },
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Create a timeout error with the given details.
    pub fn timeout(pattern: impl Into<String>, elapsed: Duration, buffer: impl Into<String>) -> Self {
        Self::Timeout {
            pattern: pattern.into(),
            elapsed,
            buffer: buffer.into(),
        }
    }

    /// Create an EOF error.
    pub fn eof(pattern: impl Into<String>, buffer: impl Into<String>) -> Self {
        Self::Eof {
            pattern: pattern.into(),
            buffer: buffer.into(),
            exit_status: None,
        }
    }

    /// Create an assertion failure.
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Attach the child's exit status to an EOF error.
    #[must_use]
    pub fn with_exit_status(self, status: Option<ExitStatus>) -> Self {
        match self {
            Self::Eof {
                pattern, buffer, ..
            } => Self::Eof {
                pattern,
                buffer,
                exit_status: status,
            },
            other => other,
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an EOF error.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Get the unmatched output if this error carries it.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::Eof { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    /// The pattern being awaited, for timeout and EOF errors.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::Timeout { pattern, .. } | Self::Eof { pattern, .. } => Some(pattern),
            _ => None,
        }
    }
}

impl SpawnError {
    /// Classify an OS spawn failure for `command`.
    #[must_use]
    pub fn from_io(command: &str, error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::CommandNotFound {
                command: command.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: command.to_string(),
            },
            _ => Self::Pty {
                reason: format!("{command}: {error}"),
            },
        }
    }
}

impl From<harness_pty::PtyError> for SpawnError {
    fn from(error: harness_pty::PtyError) -> Self {
        Self::Pty {
            reason: error.to_string(),
        }
    }
}

/// A failed step of a test script: the error plus the script's message.
#[derive(Debug)]
pub struct TestFailure {
    /// The message the script supplied for this step, if any.
    pub message: Option<String>,
    /// What actually went wrong.
    pub error: ExpectError,
}

impl std::fmt::Display for TestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.headline())
    }
}

impl std::error::Error for TestFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl TestFailure {
    /// Create a failure with a script-supplied message.
    pub fn new(error: ExpectError, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            error,
        }
    }

    /// One line naming the failed step.
    #[must_use]
    pub fn headline(&self) -> String {
        let kind = match &self.error {
            ExpectError::Spawn(_) => "spawn error",
            ExpectError::Write { .. } => "write error",
            ExpectError::Timeout { .. } => "timeout",
            ExpectError::Eof { .. } => "EOF",
            ExpectError::Assertion { .. } => "assertion failure",
            ExpectError::Regex(_) => "invalid pattern",
            ExpectError::Io { .. } => "I/O error",
            ExpectError::Config { .. } => "configuration error",
        };
        let pattern = self
            .error
            .pattern()
            .map(|p| format!(" waiting for {p:?}"))
            .unwrap_or_default();

        match &self.message {
            Some(message) => format!("{message} ({kind}{pattern})"),
            None => format!("{kind}{pattern}"),
        }
    }
}

impl From<ExpectError> for TestFailure {
    fn from(error: ExpectError) -> Self {
        Self {
            message: None,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_pattern_and_output() {
        let err = ExpectError::timeout("Hostname:", Duration::from_millis(250), "cush> info\n");
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("\"Hostname:\""));
        assert!(msg.contains("cush> info"));
        assert!(err.is_timeout());
        assert!(!err.is_eof());
    }

    #[test]
    fn eof_display_includes_exit_status() {
        let err = ExpectError::eof("cush> ", "bye\n").with_exit_status(Some(ExitStatus::Exited(2)));
        let msg = err.to_string();
        assert!(msg.contains("exited with code 2"));
        assert!(msg.contains("bye"));
        assert!(err.is_eof());

        let unknown = ExpectError::eof("cush> ", "");
        assert!(unknown.to_string().contains("exit status unknown"));
    }

    #[test]
    fn snippet_of_empty_buffer() {
        assert_eq!(format_buffer_snippet(""), "(no unmatched output)");
    }

    #[test]
    fn snippet_keeps_tail_of_large_buffer() {
        let large: String = (0..50).fold(String::new(), |mut acc, i| {
            use std::fmt::Write;
            let _ = writeln!(acc, "{i}: some history entry");
            acc
        });

        let snippet = format_buffer_snippet(&large);
        assert!(snippet.contains("lines hidden"));
        assert!(snippet.contains("49: some history entry"));
        assert!(!snippet.contains("\n│ 0: some history entry"));
    }

    #[test]
    fn snippet_bounds_a_single_long_line() {
        let long = "x".repeat(2000);
        let snippet = format_buffer_snippet(&long);
        assert!(snippet.len() < 800);
        assert!(snippet.contains("2000 bytes"));
    }

    #[test]
    fn buffer_accessor() {
        let err = ExpectError::timeout("x", Duration::from_secs(1), "the buffer");
        assert_eq!(err.buffer(), Some("the buffer"));
        assert_eq!(err.pattern(), Some("x"));

        let io_err = ExpectError::io_context("opening transcript", std::io::Error::other("boom"));
        assert!(io_err.buffer().is_none());
        assert_eq!(io_err.to_string(), "opening transcript: boom");
    }

    #[test]
    fn spawn_error_classification() {
        let not_found = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(
            SpawnError::from_io("./cush", &not_found),
            SpawnError::CommandNotFound { .. }
        ));

        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let err = SpawnError::from_io("/etc/passwd", &denied);
        assert_eq!(err.to_string(), "permission denied: /etc/passwd");
    }

    #[test]
    fn failure_headline_names_message_kind_and_pattern() {
        let failure = TestFailure::new(
            ExpectError::timeout("Hostname:", Duration::from_secs(1), ""),
            "info did not print hostname",
        );
        assert_eq!(
            failure.headline(),
            "info did not print hostname (timeout waiting for \"Hostname:\")"
        );

        let bare = TestFailure::from(ExpectError::assertion("test_success was never called"));
        assert_eq!(bare.to_string(), "assertion failure");
    }
}
