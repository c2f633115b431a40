//! Configuration types for PTY creation and child process control.
//!
//! This module provides [`PtyConfig`] for configuring how a child is spawned
//! in a PTY and [`PtySignal`] for the signals the harness sends to it.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

/// Configuration for spawning a child process in a new PTY.
///
/// # Example
///
/// ```
/// use harness_pty::PtyConfig;
///
/// let config = PtyConfig::builder()
///     .working_directory("/tmp")
///     .env("TERM", "dumb")
///     .window_size(80, 24)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,

    /// Base environment for the child process.
    /// If None, inherits from the parent process.
    pub env: Option<HashMap<OsString, OsString>>,

    /// Additional environment variables (merged over the base environment).
    pub env_add: HashMap<OsString, OsString>,

    /// Environment variables to remove from the base environment.
    pub env_remove: Vec<OsString>,

    /// Initial window size (columns, rows).
    pub window_size: (u16, u16),

    /// Whether to start the child in a new session (`setsid`).
    pub new_session: bool,

    /// Whether to make the PTY slave the child's controlling terminal.
    pub controlling_terminal: bool,

    /// Whether the child is killed when the harness process dies (Linux only).
    pub die_with_parent: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            env: None,
            env_add: HashMap::new(),
            env_remove: Vec::new(),
            window_size: (80, 24),
            new_session: true,
            controlling_terminal: true,
            die_with_parent: true,
        }
    }
}

impl PtyConfig {
    /// Create a new builder for `PtyConfig`.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::new()
    }

    /// Create a new `PtyConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the effective environment for the child process.
    ///
    /// This merges the base environment (inherited or explicit), adds
    /// variables from `env_add`, and removes variables from `env_remove`.
    #[must_use]
    pub fn effective_env(&self) -> HashMap<OsString, OsString> {
        let mut env = self
            .env
            .clone()
            .unwrap_or_else(|| std::env::vars_os().collect());

        env.extend(self.env_add.clone());

        for key in &self.env_remove {
            env.remove(key);
        }

        env
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    config: PtyConfig,
}

impl PtyConfigBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory for the child process.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Start from an empty environment instead of inheriting the parent's.
    #[must_use]
    pub fn env_clear(mut self) -> Self {
        self.config.env = Some(HashMap::new());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env_add.insert(key.into(), value.into());
        self
    }

    /// Remove an environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.config.env_remove.push(key.into());
        self
    }

    /// Set the initial window size.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.config.window_size = (cols, rows);
        self
    }

    /// Set whether to create a new session.
    #[must_use]
    pub const fn new_session(mut self, value: bool) -> Self {
        self.config.new_session = value;
        self
    }

    /// Set whether to use a controlling terminal.
    #[must_use]
    pub const fn controlling_terminal(mut self, value: bool) -> Self {
        self.config.controlling_terminal = value;
        self
    }

    /// Set whether the child dies together with the harness process.
    #[must_use]
    pub const fn die_with_parent(mut self, value: bool) -> Self {
        self.config.die_with_parent = value;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.config
    }
}

/// Signals the harness sends to a child running in a PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PtySignal {
    /// Interrupt signal (SIGINT).
    Interrupt,

    /// Quit signal (SIGQUIT).
    Quit,

    /// Terminate signal (SIGTERM).
    Terminate,

    /// Kill signal, cannot be caught (SIGKILL).
    Kill,

    /// Hangup signal, terminal closed (SIGHUP).
    Hangup,
}

impl PtySignal {
    /// Get the Unix signal number.
    #[cfg(unix)]
    #[must_use]
    pub const fn as_unix_signal(self) -> i32 {
        match self {
            Self::Interrupt => libc::SIGINT,
            Self::Quit => libc::SIGQUIT,
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
            Self::Hangup => libc::SIGHUP,
        }
    }
}

/// Window size for the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns (characters per line).
    pub cols: u16,
    /// Number of rows (lines).
    pub rows: u16,
}

impl WindowSize {
    /// Create a new window size with the given dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl From<(u16, u16)> for WindowSize {
    fn from((cols, rows): (u16, u16)) -> Self {
        Self::new(cols, rows)
    }
}
