//! Blocking test-run facade.
//!
//! A [`TestRun`] is what a test script holds: one shell session plus the
//! runtime that drives it. Every step blocks the calling thread until it
//! completes, and the first failing step finalizes the run as a failure.
//! [`run`] wraps a script closure with setup, panic handling and reporting.
//!
//! ```ignore
//! use std::process::ExitCode;
//!
//! fn main() -> ExitCode {
//!     cush_expect::run(|t| {
//!         t.expect_prompt("Prompt did not appear.")?;
//!         t.sendline("info")?;
//!         t.expect("Hostname:", "info did not print hostname")?;
//!         t.expect_prompt_default()?;
//!         t.test_success()
//!     })
//! }
//! ```

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;
use std::time::Duration;

use harness_pty::{
    ExitStatus, PtySignal, TerminationWatcher, exit_code_for_signal, signal_pid,
    signal_process_group, watch_termination,
};
use tokio::runtime::{Builder, Runtime};

use crate::config::HarnessConfig;
use crate::error::{ExpectError, Result, TestFailure};
use crate::expect::Pattern;
use crate::logging;
use crate::report::TestResult;
use crate::session::Session;
use crate::types::{ControlChar, Match};

/// Failure message used by `expect_prompt_default`.
pub const DEFAULT_PROMPT_MESSAGE: &str = "shell prompt did not appear";

/// Name reported when the executable name cannot be determined.
const FALLBACK_NAME: &str = "cush-test";

/// One test run against one shell.
///
/// Dropping the run terminates the shell if the run was never finalized.
/// Must not be used from within an async context.
pub struct TestRun {
    /// The shell session. Kept after finalization so its status stays readable.
    session: Option<Session>,
    /// Kills the shell if the harness is interrupted.
    watcher: Option<TerminationWatcher>,
    config: HarnessConfig,
    /// Set exactly once, by the first finalization.
    result: Option<TestResult>,
    /// Name used in reports.
    name: String,
    /// Drives the accumulator in the background and the steps in `block_on`.
    runtime: Runtime,
}

impl std::fmt::Debug for TestRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRun")
            .field("name", &self.name)
            .field("session", &self.session)
            .field("result", &self.result)
            .finish()
    }
}

/// Load configuration from the environment and start a run.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the shell cannot be
/// started.
pub fn setup_tests() -> Result<TestRun> {
    TestRun::setup(HarnessConfig::load()?)
}

impl TestRun {
    /// Start a run with an explicit configuration.
    ///
    /// Spawns the shell, starts accumulating its output and, unless disabled,
    /// installs the termination-signal watcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the runtime cannot be
    /// built, or the shell cannot be started.
    pub fn setup(config: HarnessConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("cush-harness")
            .enable_all()
            .build()
            .map_err(|e| ExpectError::io_context("creating tokio runtime", e))?;

        let session = runtime.block_on(Session::spawn(&config))?;
        let name = script_name();

        let watcher = if config.handle_signals {
            let _guard = runtime.enter();
            let pid = session.pid();
            let report_name = name.clone();
            let watcher = watch_termination(move |signal| {
                let _ = signal_process_group(pid, PtySignal::Kill);
                let _ = signal_pid(pid, PtySignal::Kill);
                let _ = writeln!(
                    std::io::stderr().lock(),
                    "FAIL: {report_name}: interrupted by signal {signal}"
                );
                std::process::exit(exit_code_for_signal(signal));
            })
            .map_err(|e| ExpectError::io_context("installing signal handlers", e))?;
            Some(watcher)
        } else {
            None
        };

        tracing::debug!(name = %name, pid = session.pid(), "test run started");

        Ok(Self {
            session: Some(session),
            watcher,
            config,
            result: None,
            name,
            runtime,
        })
    }

    /// Override the name used in reports.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The configuration this run was started with.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Name used in reports.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shell's process ID.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.session.as_ref().map(Session::pid)
    }

    /// The shell's exit status, once it has been reaped.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.session.as_ref().and_then(Session::exit_status)
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// The final result, once the run has been finalized.
    #[must_use]
    pub const fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    /// Whether the run has been finalized.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    /// Send a line to the shell.
    ///
    /// # Errors
    ///
    /// Fails the run if the write fails or the run is already finished.
    pub fn sendline(&mut self, text: &str) -> std::result::Result<(), TestFailure> {
        let outcome = self
            .active()
            .and_then(|(runtime, session)| runtime.block_on(session.send_line(text)));
        self.settle(outcome, None)
    }

    /// Send text to the shell without a line terminator.
    ///
    /// # Errors
    ///
    /// Fails the run if the write fails or the run is already finished.
    pub fn send(&mut self, text: &str) -> std::result::Result<(), TestFailure> {
        let outcome = self
            .active()
            .and_then(|(runtime, session)| runtime.block_on(session.send_str(text)));
        self.settle(outcome, None)
    }

    /// Send a control character such as Ctrl-C.
    ///
    /// # Errors
    ///
    /// Fails the run if the write fails or the run is already finished.
    pub fn sendcontrol(&mut self, ctrl: ControlChar) -> std::result::Result<(), TestFailure> {
        let outcome = self
            .active()
            .and_then(|(runtime, session)| runtime.block_on(session.send_control(ctrl)));
        self.settle(outcome, None)
    }

    /// Wait for `pattern` with the configured timeout.
    ///
    /// # Errors
    ///
    /// Fails the run with `message` on timeout or EOF.
    pub fn expect(
        &mut self,
        pattern: impl Into<Pattern>,
        message: &str,
    ) -> std::result::Result<Match, TestFailure> {
        let timeout = self.config.timeout;
        self.expect_with_timeout(pattern, timeout, message)
    }

    /// Wait for `pattern` with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Fails the run with `message` on timeout, EOF or a zero timeout.
    pub fn expect_with_timeout(
        &mut self,
        pattern: impl Into<Pattern>,
        timeout: Duration,
        message: &str,
    ) -> std::result::Result<Match, TestFailure> {
        let pattern = pattern.into();
        let outcome = self.active().and_then(|(runtime, session)| {
            runtime.block_on(session.expect_timeout(pattern, timeout))
        });
        self.settle(outcome, Some(message))
    }

    /// Wait for a regular expression.
    ///
    /// # Errors
    ///
    /// Fails the run if `regex` does not compile, or with `message` on
    /// timeout or EOF.
    pub fn expect_regex(&mut self, regex: &str, message: &str) -> std::result::Result<Match, TestFailure> {
        match Pattern::regex(regex) {
            Ok(pattern) => self.expect(pattern, message),
            Err(e) => self.settle(Err(e.into()), Some(message)),
        }
    }

    /// Wait for the shell prompt, failing the run with `message` if it does
    /// not appear.
    ///
    /// # Errors
    ///
    /// Fails the run on timeout or EOF.
    pub fn expect_prompt(&mut self, message: &str) -> std::result::Result<Match, TestFailure> {
        let prompt = Pattern::literal(self.config.prompt.clone());
        self.expect(prompt, message)
    }

    /// Wait for the shell prompt with a generic failure message.
    ///
    /// # Errors
    ///
    /// Fails the run on timeout or EOF.
    pub fn expect_prompt_default(&mut self) -> std::result::Result<Match, TestFailure> {
        self.expect_prompt(DEFAULT_PROMPT_MESSAGE)
    }

    /// Wait for the shell's output to end, returning whatever it printed
    /// that no expectation consumed.
    ///
    /// # Errors
    ///
    /// Fails the run with `message` if output is still open at the timeout.
    pub fn expect_eof(&mut self, message: &str) -> std::result::Result<String, TestFailure> {
        let timeout = self.config.timeout;
        let outcome = self
            .active()
            .and_then(|(runtime, session)| runtime.block_on(session.expect_eof(timeout)));
        self.settle(outcome, Some(message))
    }

    /// Finalize the run as passed: stop the shell and report success.
    ///
    /// # Errors
    ///
    /// Returns an assertion failure if the run was already finished.
    pub fn test_success(&mut self) -> std::result::Result<(), TestFailure> {
        if let Some(result) = &self.result {
            let error = ExpectError::assertion(format!(
                "test_success called after the run already finished with {}",
                result.status
            ));
            return self.settle(Err(error), None);
        }
        self.finalize(TestResult::pass());
        Ok(())
    }

    /// Finalize the run as failed with a script-level message.
    ///
    /// Returns the failure so the script can propagate it with `?`.
    pub fn fail(&mut self, message: &str) -> TestFailure {
        let failure = TestFailure::new(ExpectError::assertion(message), message);
        self.record_failure(&failure);
        failure
    }

    /// Borrow the runtime and live session, or explain why there is none.
    fn active(&mut self) -> Result<(&Runtime, &mut Session)> {
        if let Some(result) = &self.result {
            return Err(ExpectError::assertion(format!(
                "the run already finished with {}; no further interaction is allowed",
                result.status
            )));
        }
        match self.session.as_mut() {
            Some(session) => Ok((&self.runtime, session)),
            None => Err(ExpectError::assertion("the run has no shell session")),
        }
    }

    /// Turn a step outcome into the script-facing result, failing the run on error.
    fn settle<T>(
        &mut self,
        outcome: Result<T>,
        message: Option<&str>,
    ) -> std::result::Result<T, TestFailure> {
        outcome.map_err(|error| {
            let failure = TestFailure {
                message: message.map(str::to_string),
                error,
            };
            self.record_failure(&failure);
            failure
        })
    }

    /// Finalize as failed, or log if the run already has its result.
    fn record_failure(&mut self, failure: &TestFailure) {
        if let Some(result) = &self.result {
            tracing::error!(status = %result.status, failure = %failure, "step failed after the run finished");
            let _ = writeln!(
                std::io::stderr().lock(),
                "{}: step after the run finished: {}",
                self.name,
                failure.error
            );
            return;
        }
        self.finalize(TestResult::fail(failure));
    }

    /// Stop the shell, report, and record `result`. Runs at most once.
    fn finalize(&mut self, mut result: TestResult) {
        if self.result.is_some() {
            return;
        }

        if let Some(session) = self.session.as_mut() {
            if let Err(error) = self.runtime.block_on(session.terminate()) {
                tracing::error!(error = %error, "failed to stop the shell");
                if result.is_pass() {
                    result = TestResult::fail(&TestFailure::new(error, "could not stop the shell"));
                }
            }
        }

        if let Some(watcher) = self.watcher.take() {
            watcher.shutdown();
        }

        result.emit(&self.name);
        self.result = Some(result);
    }
}

impl Drop for TestRun {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if !session.state().is_closed() {
                if let Err(error) = self.runtime.block_on(session.terminate()) {
                    tracing::warn!(error = %error, "failed to stop the shell during cleanup");
                }
            }
            let _guard = self.runtime.enter();
            drop(session);
        }
        drop(self.watcher.take());
    }
}

/// Run `script` against a freshly spawned shell and report the outcome.
///
/// Loads configuration from the environment, installs logging, and returns
/// the exit code for `main`. A script that returns without calling
/// [`TestRun::test_success`] fails, as does one that panics.
pub fn run<F>(script: F) -> ExitCode
where
    F: FnOnce(&mut TestRun) -> std::result::Result<(), TestFailure>,
{
    logging::init();

    let result = match HarnessConfig::load() {
        Ok(config) => run_with_config(config, script),
        Err(error) => {
            let failure = TestFailure::new(error, "invalid harness configuration");
            let result = TestResult::fail(&failure);
            result.emit(&script_name());
            result
        }
    };
    result.exit_code()
}

/// Run `script` with an explicit configuration and return its result.
pub fn run_with_config<F>(config: HarnessConfig, script: F) -> TestResult
where
    F: FnOnce(&mut TestRun) -> std::result::Result<(), TestFailure>,
{
    let mut run = match TestRun::setup(config) {
        Ok(run) => run,
        Err(error) => {
            let failure = TestFailure::new(error, "could not start the shell");
            let result = TestResult::fail(&failure);
            result.emit(&script_name());
            return result;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| script(&mut run))) {
        Ok(Ok(())) => {
            if !run.is_finished() {
                run.record_failure(&TestFailure::new(
                    ExpectError::assertion("script ended without calling test_success"),
                    "test did not report success",
                ));
            }
        }
        Ok(Err(failure)) => {
            // Failed steps finalize the run themselves; this covers failures
            // the script built by hand.
            if !run.is_finished() {
                run.record_failure(&failure);
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            if run.is_finished() {
                tracing::error!(panic = %message, "script panicked after the run finished");
            } else {
                run.record_failure(&TestFailure::new(
                    ExpectError::assertion(format!("script panicked: {message}")),
                    "test script panicked",
                ));
            }
        }
    }

    run.result().cloned().unwrap_or_else(|| {
        TestResult::fail(&TestFailure::from(ExpectError::assertion(
            "run ended without a result",
        )))
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn script_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(std::path::Path::new)
        .and_then(std::path::Path::file_stem)
        .map_or_else(
            || FALLBACK_NAME.to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn script_name_is_not_empty() {
        assert!(!script_name().is_empty());
    }
}
