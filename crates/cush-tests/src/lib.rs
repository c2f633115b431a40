//! Shared helpers for the cush test scripts and the `test-cush` stand-in.

use std::path::PathBuf;

/// Environment variable that makes `test-cush` forget its history.
///
/// Used to check that a broken shell actually fails the history test.
pub const NO_HISTORY_VAR: &str = "TEST_CUSH_NO_HISTORY";

/// The machine's hostname, as `gethostname` reports it.
#[cfg(unix)]
#[must_use]
pub fn hostname() -> String {
    rustix::system::uname().nodename().to_string_lossy().into_owned()
}

/// The directory the shell under test will report from `info`.
///
/// That is the configured working directory when there is one, and the
/// script's own current directory otherwise.
pub fn expected_cwd(config: &cush_expect::HarnessConfig) -> std::io::Result<PathBuf> {
    match &config.working_dir {
        Some(dir) => std::fs::canonicalize(dir),
        None => std::env::current_dir(),
    }
}
