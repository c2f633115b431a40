//! Environment-based configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ExpectError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "CUSH";

/// Environment variable naming a TOML configuration file.
pub const CONFIG_FILE_VAR: &str = "CUSH_TEST_CONFIG";

/// Variable names recognized under the prefix.
pub mod vars {
    /// Shell executable.
    pub const SHELL: &str = "SHELL";
    /// Whitespace-separated shell arguments.
    pub const ARGS: &str = "ARGS";
    /// Working directory for the shell.
    pub const WORKDIR: &str = "WORKDIR";
    /// Prompt literal.
    pub const PROMPT: &str = "PROMPT";
    /// Default expect timeout in milliseconds.
    pub const TIMEOUT_MS: &str = "TIMEOUT_MS";
    /// `TERM` value for the child.
    pub const TERM: &str = "TERM";
    /// Path of a file receiving every byte the shell prints.
    pub const TRANSCRIPT: &str = "TRANSCRIPT";
    /// Grace period between SIGTERM and SIGKILL in milliseconds.
    pub const GRACE_MS: &str = "GRACE_MS";
}

/// Where variables are read from.
#[derive(Debug, Clone)]
enum Source {
    Process,
    Map(HashMap<String, String>),
}

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    source: Source,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a reader over the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            source: Source::Process,
        }
    }

    /// Create a reader over a fixed set of variables instead of the process
    /// environment. Keys are full variable names, prefix included.
    #[must_use]
    pub fn from_map<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            source: Source::Map(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Look up a full variable name, ignoring empty values.
    #[must_use]
    pub fn raw(&self, var_name: &str) -> Option<String> {
        let value = match &self.source {
            Source::Process => std::env::var(var_name).ok(),
            Source::Map(map) => map.get(var_name).cloned(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.raw(&self.var_name(name))
    }

    /// Get a parsed value, rejecting values that do not parse.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|v| {
                v.trim().parse().map_err(|e| {
                    ExpectError::config(format!("{}={v:?}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Get a duration in milliseconds.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Get a whitespace-separated list.
    #[must_use]
    pub fn list(&self, name: &str) -> Option<Vec<String>> {
        self.get(name)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
