//! Teardown leaves nothing behind: no shell process, no open PTY master.
//!
//! Kept in its own test binary so no other test opens PTYs concurrently.

#![cfg(target_os = "linux")]

use std::time::Duration;

use cush_expect::{HarnessConfig, TestRun, TestStatus};
use rustix::io::Errno;
use rustix::process::{Pid, test_kill_process};

fn open_pty_masters() -> usize {
    std::fs::read_dir("/proc/self/fd")
        .unwrap()
        .filter_map(Result::ok)
        .filter_map(|entry| std::fs::read_link(entry.path()).ok())
        .filter(|target| target.to_string_lossy().ends_with("ptmx"))
        .count()
}

#[test]
fn success_reaps_shell_and_closes_pty() {
    let baseline = open_pty_masters();

    for _ in 0..3 {
        let config = HarnessConfig::new(env!("CARGO_BIN_EXE_test-cush"))
            .timeout(Duration::from_secs(10))
            .handle_signals(false);
        let mut run = TestRun::setup(config).unwrap();
        let pid = run.pid().unwrap();
        assert!(open_pty_masters() > baseline);

        run.expect_prompt_default().unwrap();
        run.sendline("info").unwrap();
        run.expect("Current Directory:", "info output").unwrap();
        run.test_success().unwrap();
        assert_eq!(run.result().unwrap().status, TestStatus::Pass);

        let pid = Pid::from_raw(pid as i32).unwrap();
        assert_eq!(test_kill_process(pid), Err(Errno::SRCH));
        assert_eq!(open_pty_masters(), baseline);

        drop(run);
        assert_eq!(open_pty_masters(), baseline);
    }
}
