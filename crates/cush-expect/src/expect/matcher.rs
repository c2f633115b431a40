//! Pattern matching engine for expect operations.
//!
//! The matcher scans the unconsumed region of the shared output buffer and,
//! when nothing matches yet, sleeps until the accumulator reports new data,
//! the stream ends, or the deadline passes. Every wakeup rescans the whole
//! unconsumed region, so a match split across reads is still found.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::accumulator::{SharedBuffer, lock};
use super::pattern::Pattern;
use crate::error::{ExpectError, Result};
use crate::types::Match;

/// Label used in diagnostics when waiting for end-of-stream.
const EOF_LABEL: &str = "<end of output>";

/// The pattern matching engine.
#[derive(Debug)]
pub struct Matcher {
    /// Output shared with the accumulator.
    buffer: SharedBuffer,
    /// Bumped by the accumulator on every append and at end-of-stream.
    version: watch::Receiver<u64>,
}

impl Matcher {
    pub(crate) const fn new(buffer: SharedBuffer, version: watch::Receiver<u64>) -> Self {
        Self { buffer, version }
    }

    /// Match and consume `pattern` if it is already in the buffer.
    pub fn try_match(&self, pattern: &Pattern) -> Option<Match> {
        lock(&self.buffer).consume_match(pattern)
    }

    /// Output not yet consumed by any match.
    #[must_use]
    pub fn unconsumed(&self) -> String {
        lock(&self.buffer).unconsumed_lossy()
    }

    /// Whether the shell's output has ended.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        lock(&self.buffer).is_eof()
    }

    /// Wait for `pattern` to appear in output not yet consumed.
    ///
    /// On success the scan cursor moves just past the match, so the same
    /// occurrence is never returned twice.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::Assertion`] if `timeout` is zero or `pattern` matches
    ///   the empty string.
    /// - [`ExpectError::Eof`] if the output ends without a match.
    /// - [`ExpectError::Timeout`] if the deadline passes without a match.
    pub async fn expect(&mut self, pattern: &Pattern, timeout: Duration) -> Result<Match> {
        if timeout.is_zero() {
            return Err(ExpectError::assertion(format!(
                "timeout for {:?} must be greater than zero",
                pattern.as_str()
            )));
        }
        if pattern.matches_empty() {
            return Err(ExpectError::assertion(format!(
                "pattern {:?} matches the empty string",
                pattern.as_str()
            )));
        }

        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            // Mark the current version seen before scanning so an append that
            // races with the scan still wakes us up.
            self.version.borrow_and_update();
            {
                let mut buffer = lock(&self.buffer);
                if let Some(m) = buffer.consume_match(pattern) {
                    return Ok(m);
                }
                if buffer.is_eof() {
                    return Err(ExpectError::eof(pattern.as_str(), buffer.unconsumed_lossy()));
                }
            }

            match tokio::time::timeout_at(deadline, self.version.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    // The reader is gone without flagging EOF (it was stopped).
                    let mut buffer = lock(&self.buffer);
                    return buffer.consume_match(pattern).ok_or_else(|| {
                        ExpectError::eof(pattern.as_str(), buffer.unconsumed_lossy())
                    });
                }
                Err(_) => {
                    // Data may have landed right at the deadline.
                    let mut buffer = lock(&self.buffer);
                    return buffer.consume_match(pattern).ok_or_else(|| {
                        ExpectError::timeout(
                            pattern.as_str(),
                            start.elapsed(),
                            buffer.unconsumed_lossy(),
                        )
                    });
                }
            }
        }
    }

    /// Wait for the shell's output to end and return whatever was left unconsumed.
    ///
    /// # Errors
    ///
    /// - [`ExpectError::Assertion`] if `timeout` is zero.
    /// - [`ExpectError::Timeout`] if output is still open at the deadline.
    pub async fn expect_eof(&mut self, timeout: Duration) -> Result<String> {
        if timeout.is_zero() {
            return Err(ExpectError::assertion(
                "timeout for end of output must be greater than zero",
            ));
        }

        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            self.version.borrow_and_update();
            {
                let mut buffer = lock(&self.buffer);
                if buffer.is_eof() {
                    return Ok(buffer.consume_rest());
                }
            }

            match tokio::time::timeout_at(deadline, self.version.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Ok(lock(&self.buffer).consume_rest()),
                Err(_) => {
                    let mut buffer = lock(&self.buffer);
                    if buffer.is_eof() {
                        return Ok(buffer.consume_rest());
                    }
                    return Err(ExpectError::timeout(
                        EOF_LABEL,
                        start.elapsed(),
                        buffer.unconsumed_lossy(),
                    ));
                }
            }
        }
    }
}
