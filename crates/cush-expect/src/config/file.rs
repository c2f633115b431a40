//! File-based configuration loading.
//!
//! A harness config file is TOML. Every key is optional; anything left out
//! keeps its built-in default.
//!
//! ```toml
//! shell = "./cush"
//! args = ["--no-rc"]
//! prompt = "cush> "
//! timeout_ms = 5000
//!
//! [env]
//! LANG = "C"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::LineEnding;
use crate::error::{ExpectError, Result};

/// Contents of a harness configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Shell executable.
    pub shell: Option<String>,
    /// Shell arguments.
    pub args: Option<Vec<String>>,
    /// Working directory for the shell.
    pub working_dir: Option<PathBuf>,
    /// Prompt literal.
    pub prompt: Option<String>,
    /// Default expect timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Grace period between SIGTERM and SIGKILL in milliseconds.
    pub terminate_grace_ms: Option<u64>,
    /// `TERM` value for the child.
    pub term: Option<String>,
    /// Terminal columns.
    pub columns: Option<u16>,
    /// Terminal rows.
    pub rows: Option<u16>,
    /// Line terminator appended by `sendline`.
    pub line_ending: Option<LineEnding>,
    /// Transcript file path.
    pub transcript: Option<PathBuf>,
    /// Whether to install the termination-signal watcher.
    pub handle_signals: Option<bool>,
    /// Extra environment variables for the shell.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl FileConfig {
    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ExpectError::config(e.to_string()))
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExpectError::io_context(format!("reading config file {}", path.display()), e)
        })?;
        Self::parse(&content).map_err(|e| match e {
            ExpectError::Config { message } => {
                ExpectError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }
}
