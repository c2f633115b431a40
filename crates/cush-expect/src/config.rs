//! Configuration types for cush-expect.
//!
//! [`HarnessConfig`] describes the shell under test and how the harness
//! talks to it. Values are layered: built-in defaults, then an optional TOML
//! file named by `CUSH_TEST_CONFIG`, then `CUSH_*` environment variables.

pub mod env;
pub mod file;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use harness_pty::PtyConfig;
use serde::Deserialize;

pub use env::EnvConfig;
pub use file::FileConfig;

use crate::error::{ExpectError, Result};

/// Default shell executable, relative to the working directory.
pub const DEFAULT_SHELL: &str = "./cush";

/// Default prompt printed by cush.
pub const DEFAULT_PROMPT: &str = "cush> ";

/// Default timeout for expect operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time the shell gets to exit after SIGTERM before SIGKILL.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Default TERM environment variable value.
///
/// A dumb terminal keeps line editors from emitting escape sequences that
/// would get in the way of literal matches.
pub const DEFAULT_TERM: &str = "dumb";

/// Default terminal width.
pub const DEFAULT_TERMINAL_WIDTH: u16 = 80;

/// Default terminal height.
pub const DEFAULT_TERMINAL_HEIGHT: u16 = 24;

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,

    /// Carriage return only, as the Enter key sends.
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }

    /// Get the line ending as bytes.
    #[must_use]
    pub const fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }
}

/// Configuration for a harness run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// The shell executable.
    pub shell: String,

    /// Shell arguments.
    pub args: Vec<String>,

    /// Working directory for the shell. `None` inherits the harness's.
    pub working_dir: Option<PathBuf>,

    /// Prompt literal awaited by `expect_prompt`.
    pub prompt: String,

    /// Default timeout for expect operations.
    pub timeout: Duration,

    /// Time between SIGTERM and SIGKILL when tearing the shell down.
    pub terminate_grace: Duration,

    /// `TERM` for the shell.
    pub term: String,

    /// Extra environment variables for the shell.
    pub env: HashMap<String, String>,

    /// Terminal dimensions (columns, rows).
    pub window_size: (u16, u16),

    /// Line terminator appended by `sendline`.
    pub line_ending: LineEnding,

    /// File receiving a copy of everything the shell prints.
    pub transcript: Option<PathBuf>,

    /// Whether to kill the shell and exit when the harness gets SIGINT,
    /// SIGTERM or SIGHUP.
    pub handle_signals: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            args: Vec::new(),
            working_dir: None,
            prompt: DEFAULT_PROMPT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            terminate_grace: DEFAULT_TERMINATE_GRACE,
            term: DEFAULT_TERM.to_string(),
            env: HashMap::new(),
            window_size: (DEFAULT_TERMINAL_WIDTH, DEFAULT_TERMINAL_HEIGHT),
            line_ending: LineEnding::default(),
            transcript: None,
            handle_signals: true,
        }
    }
}

impl HarnessConfig {
    /// Create a configuration for the given shell with default settings.
    #[must_use]
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            ..Default::default()
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::Config`] for malformed values and
    /// [`ExpectError::Io`] if the config file cannot be read.
    pub fn load() -> Result<Self> {
        Self::load_from(&EnvConfig::default())
    }

    /// Load configuration from the given variables.
    pub fn load_from(vars: &EnvConfig) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = vars.raw(env::CONFIG_FILE_VAR) {
            let file = FileConfig::load(std::path::Path::new(&path))?;
            config.apply_file(file);
        }
        config.apply_env(vars)?;
        config.validate()?;

        tracing::debug!(shell = %config.shell, prompt = ?config.prompt, timeout = ?config.timeout, "loaded harness configuration");
        Ok(config)
    }

    /// Overlay values from a config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(shell) = file.shell {
            self.shell = shell;
        }
        if let Some(args) = file.args {
            self.args = args;
        }
        if file.working_dir.is_some() {
            self.working_dir = file.working_dir;
        }
        if let Some(prompt) = file.prompt {
            self.prompt = prompt;
        }
        if let Some(ms) = file.timeout_ms {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.terminate_grace_ms {
            self.terminate_grace = Duration::from_millis(ms);
        }
        if let Some(term) = file.term {
            self.term = term;
        }
        if let Some(cols) = file.columns {
            self.window_size.0 = cols;
        }
        if let Some(rows) = file.rows {
            self.window_size.1 = rows;
        }
        if let Some(line_ending) = file.line_ending {
            self.line_ending = line_ending;
        }
        if file.transcript.is_some() {
            self.transcript = file.transcript;
        }
        if let Some(handle) = file.handle_signals {
            self.handle_signals = handle;
        }
        self.env.extend(file.env);
    }

    /// Overlay values from `CUSH_*` variables.
    pub fn apply_env(&mut self, vars: &EnvConfig) -> Result<()> {
        use env::vars::{ARGS, GRACE_MS, PROMPT, SHELL, TERM, TIMEOUT_MS, TRANSCRIPT, WORKDIR};

        if let Some(shell) = vars.get(SHELL) {
            self.shell = shell;
        }
        if let Some(args) = vars.list(ARGS) {
            self.args = args;
        }
        if let Some(dir) = vars.get(WORKDIR) {
            self.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(prompt) = vars.get(PROMPT) {
            self.prompt = prompt;
        }
        if let Some(timeout) = vars.duration_millis(TIMEOUT_MS)? {
            self.timeout = timeout;
        }
        if let Some(grace) = vars.duration_millis(GRACE_MS)? {
            self.terminate_grace = grace;
        }
        if let Some(term) = vars.get(TERM) {
            self.term = term;
        }
        if let Some(path) = vars.get(TRANSCRIPT) {
            self.transcript = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Check that the configuration can drive a run.
    pub fn validate(&self) -> Result<()> {
        if self.shell.is_empty() {
            return Err(ExpectError::config("shell must not be empty"));
        }
        if self.prompt.is_empty() {
            return Err(ExpectError::config("prompt must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(ExpectError::config("timeout must be greater than zero"));
        }
        if self.window_size.0 == 0 || self.window_size.1 == 0 {
            return Err(ExpectError::config("window size must be non-zero"));
        }
        Ok(())
    }

    /// Set the shell arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the prompt literal.
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the default expect timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the SIGTERM grace period.
    #[must_use]
    pub const fn terminate_grace(mut self, grace: Duration) -> Self {
        self.terminate_grace = grace;
        self
    }

    /// Set `TERM` for the shell.
    #[must_use]
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the terminal dimensions.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.window_size = (cols, rows);
        self
    }

    /// Set the line ending used by `sendline`.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Record everything the shell prints to `path`.
    #[must_use]
    pub fn transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript = Some(path.into());
        self
    }

    /// Enable or disable the termination-signal watcher.
    #[must_use]
    pub const fn handle_signals(mut self, handle: bool) -> Self {
        self.handle_signals = handle;
        self
    }

    /// PTY settings for spawning the shell.
    #[must_use]
    pub fn to_pty_config(&self) -> PtyConfig {
        let mut builder = PtyConfig::builder()
            .env("TERM", &self.term)
            .window_size(self.window_size.0, self.window_size.1);
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            builder = builder.working_directory(dir);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    #[test]
    fn defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.shell, "./cush");
        assert_eq!(config.prompt, "cush> ");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.term, "dumb");
        assert_eq!(config.line_ending.as_bytes(), b"\n");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_defaults() {
        let vars = EnvConfig::from_map(
            "CUSH",
            [
                ("CUSH_SHELL", "/bin/cat"),
                ("CUSH_ARGS", "-u"),
                ("CUSH_TIMEOUT_MS", "250"),
                ("CUSH_PROMPT", "$ "),
                ("CUSH_GRACE_MS", "100"),
            ],
        );
        let config = HarnessConfig::load_from(&vars).unwrap();
        assert_eq!(config.shell, "/bin/cat");
        assert_eq!(config.args, vec!["-u"]);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.terminate_grace, Duration::from_millis(100));
        assert_eq!(config.prompt, "$ ");
    }

    #[test]
    fn env_wins_over_file() {
        let dir = std::env::temp_dir().join(format!("cush-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("harness.toml");
        std::fs::write(
            &path,
            "shell = \"/bin/sh\"\nprompt = \"sh> \"\nterm = \"vt100\"\n[env]\nLANG = \"C\"\n",
        )
        .unwrap();

        let vars = EnvConfig::from_map(
            "CUSH",
            [
                ("CUSH_TEST_CONFIG", path.to_string_lossy().into_owned()),
                ("CUSH_SHELL", "/bin/cat".to_string()),
            ],
        );
        let config = HarnessConfig::load_from(&vars).unwrap();
        assert_eq!(config.shell, "/bin/cat");
        assert_eq!(config.prompt, "sh> ");
        assert_eq!(config.term, "vt100");
        assert_eq!(config.env.get("LANG").map(String::as_str), Some("C"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let vars = EnvConfig::from_map("CUSH", [("CUSH_TIMEOUT_MS", "0")]);
        let err = HarnessConfig::load_from(&vars).unwrap_err();
        assert!(matches!(err, ExpectError::Config { .. }));

        let vars = EnvConfig::from_map("CUSH", [("CUSH_GRACE_MS", "-1")]);
        assert!(HarnessConfig::load_from(&vars).is_err());
    }

    #[test]
    fn pty_config_carries_term_and_env() {
        let config = HarnessConfig::new("/bin/sh")
            .term("xterm")
            .env("TEST_CUSH_NO_HISTORY", "1")
            .window_size(100, 30)
            .working_dir("/tmp");
        let pty = config.to_pty_config();

        let env = pty.effective_env();
        assert_eq!(env.get(&OsString::from("TERM")), Some(&OsString::from("xterm")));
        assert_eq!(
            env.get(&OsString::from("TEST_CUSH_NO_HISTORY")),
            Some(&OsString::from("1"))
        );
        assert_eq!(pty.window_size, (100, 30));
        assert_eq!(pty.working_directory, Some(PathBuf::from("/tmp")));
    }
}
