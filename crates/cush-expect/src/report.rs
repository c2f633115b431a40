//! Result reporting.
//!
//! A run ends in exactly one [`TestResult`]. The reporter renders it as a
//! `PASS`/`FAIL` line on stderr, followed for failures by the error detail,
//! and maps it to the process exit code.

use std::fmt;
use std::io::Write;
use std::process::ExitCode;

use crate::error::TestFailure;

/// Exit code of a passing run.
pub const EXIT_PASS: u8 = 0;

/// Exit code of a failing run.
pub const EXIT_FAIL: u8 = 1;

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    /// `test_success` was reached.
    Pass,
    /// Something failed first.
    Fail,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail => f.write_str("FAIL"),
        }
    }
}

/// The final result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Pass or fail.
    pub status: TestStatus,
    /// One-line summary of the failure.
    pub message: Option<String>,
    /// Full error text, including the unmatched output snippet.
    pub detail: Option<String>,
    /// Process exit code for this result.
    pub exit_code: u8,
}

impl TestResult {
    /// A passing result.
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            status: TestStatus::Pass,
            message: None,
            detail: None,
            exit_code: EXIT_PASS,
        }
    }

    /// A failing result describing `failure`.
    #[must_use]
    pub fn fail(failure: &TestFailure) -> Self {
        Self {
            status: TestStatus::Fail,
            message: Some(failure.headline()),
            detail: Some(failure.error.to_string()),
            exit_code: EXIT_FAIL,
        }
    }

    /// Whether the run passed.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.status == TestStatus::Pass
    }

    /// The process exit code for this result.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_code)
    }

    /// Render the report for the run called `name`.
    #[must_use]
    pub fn render(&self, name: &str) -> String {
        let mut out = format!("{}: {name}", self.status);
        if let Some(message) = &self.message {
            out.push_str(": ");
            out.push_str(message);
        }
        if let Some(detail) = &self.detail {
            for line in detail.lines() {
                out.push_str("\n    ");
                out.push_str(line);
            }
        }
        out
    }

    /// Write the report to stderr.
    pub fn emit(&self, name: &str) {
        let report = self.render(name);
        // Nothing useful to do if stderr is gone.
        let _ = writeln!(std::io::stderr().lock(), "{report}");
    }
}
