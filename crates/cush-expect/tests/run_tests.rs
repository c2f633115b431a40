//! Tests for the blocking test-run API and finalization.

#![cfg(unix)] // PTY tests only work on Unix

use std::time::Duration;

use cush_expect::{ExpectError, HarnessConfig, TestRun, TestStatus, run_with_config};

fn cat() -> HarnessConfig {
    HarnessConfig::new("/bin/cat")
        .prompt("ready> ")
        .timeout(Duration::from_secs(5))
        .handle_signals(false)
}

/// A script that reaches `test_success` passes with exit code 0.
#[test]
fn passing_script() {
    let result = run_with_config(cat(), |t| {
        t.sendline("ping")?;
        t.expect("ping", "cat did not echo")?;
        t.test_success()
    });

    assert_eq!(result.status, TestStatus::Pass);
    assert_eq!(result.exit_code, 0);
    assert!(result.message.is_none());
}

/// An unmet expectation fails the run with the script's message and pattern.
#[test]
fn unmet_expectation_fails_run() {
    let result = run_with_config(cat().timeout(Duration::from_millis(200)), |t| {
        t.expect_prompt("Prompt did not appear.")?;
        t.test_success()
    });

    assert_eq!(result.status, TestStatus::Fail);
    assert_eq!(result.exit_code, 1);
    let message = result.message.unwrap();
    assert!(message.contains("Prompt did not appear."), "{message}");
    assert!(message.contains("ready> "), "{message}");
    assert!(result.detail.unwrap().contains("timed out"));
}

/// Steps after a failure are refused and the first failure stands.
#[test]
fn failure_finalizes_immediately() {
    let result = run_with_config(cat().timeout(Duration::from_millis(100)), |t| {
        let first = t.expect("absent", "first expectation").unwrap_err();
        assert!(first.error.is_timeout());
        assert!(t.is_finished());

        let later = t.sendline("anything").unwrap_err();
        assert!(matches!(later.error, ExpectError::Assertion { .. }));
        Err(first)
    });

    assert_eq!(result.status, TestStatus::Fail);
    assert!(result.message.unwrap().starts_with("first expectation"));
}

/// Returning without `test_success` is a failure.
#[test]
fn missing_test_success_fails() {
    let result = run_with_config(cat(), |t| {
        t.sendline("ping")?;
        Ok(())
    });

    assert_eq!(result.status, TestStatus::Fail);
    assert!(result.detail.unwrap().contains("without calling test_success"));
}

/// A panicking script fails the run instead of unwinding through it.
#[test]
fn panicking_script_fails() {
    let result = run_with_config(cat(), |_t| panic!("script bug"));

    assert_eq!(result.status, TestStatus::Fail);
    assert!(result.detail.unwrap().contains("script bug"));
}

/// A shell that cannot be started fails the run.
#[test]
fn spawn_failure_fails_run() {
    let result = run_with_config(HarnessConfig::new("/nonexistent/cush"), |t| t.test_success());

    assert_eq!(result.status, TestStatus::Fail);
    assert!(result.detail.unwrap().contains("command not found"));
}

/// `test_success` stops the shell; later steps are assertion failures and
/// do not change the recorded result.
#[test]
fn steps_after_success_are_refused() {
    let mut run = TestRun::setup(cat()).unwrap();
    run.test_success().unwrap();

    assert!(run.exit_status().is_some());
    assert_eq!(run.result().unwrap().status, TestStatus::Pass);

    let err = run.sendline("ping").unwrap_err();
    assert!(matches!(err.error, ExpectError::Assertion { .. }));
    let err = run.expect("ping", "after success").unwrap_err();
    assert!(matches!(err.error, ExpectError::Assertion { .. }));
    let err = run.test_success().unwrap_err();
    assert!(matches!(err.error, ExpectError::Assertion { .. }));

    assert_eq!(run.result().unwrap().status, TestStatus::Pass);
}

/// Sending to a shell that has exited fails the run with a write error.
#[test]
fn sendline_after_exit_fails_run() {
    let config = HarnessConfig::new("/bin/sh")
        .timeout(Duration::from_secs(5))
        .handle_signals(false);
    let mut run = TestRun::setup(config).unwrap();
    run.sendline("exit").unwrap();
    run.expect_eof("shell did not exit").unwrap();

    let failure = run.sendline("echo hello").unwrap_err();
    match &failure.error {
        ExpectError::Write { source } => {
            assert_eq!(source.kind(), std::io::ErrorKind::BrokenPipe);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(run.result().unwrap().status, TestStatus::Fail);
}

/// An explicit failure from the script is recorded once.
#[test]
fn explicit_fail() {
    let mut run = TestRun::setup(cat()).unwrap().with_name("explicit");
    let failure = run.fail("history was empty");

    assert_eq!(run.name(), "explicit");
    assert_eq!(failure.message.as_deref(), Some("history was empty"));
    let result = run.result().unwrap();
    assert_eq!(result.status, TestStatus::Fail);
    assert!(run.exit_status().is_some());
}

/// Dropping an unfinished run still stops the shell.
#[cfg(target_os = "linux")]
#[test]
fn drop_stops_the_shell() {
    let run = TestRun::setup(cat()).unwrap();
    let pid = run.pid().unwrap();
    assert!(std::path::Path::new(&format!("/proc/{pid}")).exists());

    drop(run);
    assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
}

/// The signal watcher can be installed alongside a run.
#[test]
fn run_with_signal_watcher() {
    let result = run_with_config(cat().handle_signals(true), |t| {
        t.sendline("pong")?;
        t.expect_regex(r"p[aeiou]ng", "cat did not echo")?;
        t.test_success()
    });
    assert_eq!(result.status, TestStatus::Pass);
}
