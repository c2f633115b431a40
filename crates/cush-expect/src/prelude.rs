//! Convenient re-exports for writing test scripts.
//!
//! # Example
//!
//! ```ignore
//! use cush_expect::prelude::*;
//!
//! fn main() -> ExitCode {
//!     run(|t| {
//!         t.expect_prompt_default()?;
//!         t.sendline("echo hello")?;
//!         t.expect("hello", "echo did not print expected output")?;
//!         t.test_success()
//!     })
//! }
//! ```

pub use std::process::ExitCode;
pub use std::time::Duration;

pub use crate::config::{HarnessConfig, LineEnding};
pub use crate::error::{ExpectError, Result, SpawnError, TestFailure};
pub use crate::expect::Pattern;
pub use crate::report::{TestResult, TestStatus};
pub use crate::run::{TestRun, run, run_with_config, setup_tests};
pub use crate::types::{ControlChar, Match};
