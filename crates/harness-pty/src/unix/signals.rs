//! Termination signal handling for the harness process.
//!
//! When the harness itself receives SIGINT, SIGTERM or SIGHUP, the child in
//! the PTY must not outlive it. [`watch_termination`] runs a callback on the
//! first such signal; the caller decides how to clean up and exit.

use std::io;

use futures::StreamExt;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use tokio::task::JoinHandle;

/// Signals that end the harness.
pub const TERMINATION_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGHUP];

/// Keeps a termination watcher alive. Dropping it unregisters the handler.
#[derive(Debug)]
pub struct TerminationWatcher {
    handle: Handle,
    task: JoinHandle<()>,
}

impl TerminationWatcher {
    /// Stop watching.
    pub fn shutdown(&self) {
        self.handle.close();
        self.task.abort();
    }
}

impl Drop for TerminationWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run `on_signal` with the signal number the first time the harness receives
/// SIGINT, SIGTERM or SIGHUP.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if signal registration fails.
pub fn watch_termination<F>(on_signal: F) -> io::Result<TerminationWatcher>
where
    F: FnOnce(i32) + Send + 'static,
{
    let mut signals = Signals::new(TERMINATION_SIGNALS)?;
    let handle = signals.handle();

    let task = tokio::spawn(async move {
        if let Some(signal) = signals.next().await {
            tracing::warn!(signal, "harness received termination signal");
            on_signal(signal);
        }
    });

    Ok(TerminationWatcher { handle, task })
}

/// Conventional exit code for a process ended by `signal`.
#[must_use]
pub const fn exit_code_for_signal(signal: i32) -> i32 {
    128 + signal
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn exit_codes_follow_shell_convention() {
        assert_eq!(exit_code_for_signal(SIGINT), 130);
        assert_eq!(exit_code_for_signal(SIGTERM), 143);
    }

    #[tokio::test]
    async fn callback_receives_signal_number() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let watcher = watch_termination(move |signal| {
            let _ = tx.send(signal);
        })
        .expect("register watcher");

        // Give the watcher task a chance to start polling.
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal_hook::low_level::raise(SIGHUP).expect("raise SIGHUP");

        let received = tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("callback in time")
            .expect("callback ran");
        assert_eq!(received, SIGHUP);
        drop(watcher);
    }
}
