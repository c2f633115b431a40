//! cush-expect: Expect-style black-box testing for the cush shell
//!
//! This crate drives a shell through a pseudo-terminal and asserts on what it
//! prints. A test script is a plain sequence of blocking steps against a
//! [`TestRun`]: send a line, expect some output, and finally declare success.
//! The first unmet expectation ends the run with a diagnostic on stderr and a
//! non-zero exit code.
//!
//! # Layers
//!
//! - [`run`] and [`TestRun`]: the blocking script API and finalization
//! - [`Session`]: async PTY session with send/expect/terminate
//! - [`expect`]: output accumulation and pattern matching
//! - [`report`]: `PASS`/`FAIL` reporting and exit codes
//! - [`config`]: defaults, TOML file and `CUSH_*` environment overrides
//!
//! # Example
//!
//! ```ignore
//! use std::process::ExitCode;
//!
//! fn main() -> ExitCode {
//!     cush_expect::run(|t| {
//!         t.expect_prompt("Prompt did not appear.")?;
//!         t.sendline("history")?;
//!         t.expect("echo hello", "History does not list the 'echo hello' command.")?;
//!         t.expect_prompt("Prompt not shown after history command.")?;
//!         t.test_success()
//!     })
//! }
//! ```

pub mod config;
pub mod error;
pub mod expect;
pub mod logging;
pub mod prelude;
pub mod report;
pub mod run;
pub mod session;
pub mod types;

pub use config::{HarnessConfig, LineEnding};
pub use error::{ExpectError, Result, SpawnError, TestFailure};
pub use expect::Pattern;
pub use report::{TestResult, TestStatus};
pub use run::{TestRun, run, run_with_config, setup_tests};
pub use session::Session;
pub use types::{ControlChar, Match, SessionState};
