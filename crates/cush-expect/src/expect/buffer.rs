//! Output buffer for expect operations.
//!
//! Everything the shell prints is appended here in the order it was read.
//! A scan cursor separates consumed output (already matched, or skipped over
//! on the way to a match) from unconsumed output. The cursor only moves
//! forward, so a byte is matched at most once.

use std::fmt;

use super::pattern::{Pattern, PatternMatch};
use crate::types::Match;

/// Append-only byte buffer with a forward-only scan cursor.
#[derive(Clone, Default)]
pub struct OutputBuffer {
    /// Every byte received, in order.
    data: Vec<u8>,
    /// Index of the first unconsumed byte.
    cursor: usize,
    /// Whether the reader reached end-of-stream.
    eof: bool,
}

impl OutputBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the shell.
    pub fn append(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Mark end-of-stream. Later appends are still accepted but none are expected.
    pub const fn set_eof(&mut self) {
        self.eof = true;
    }

    /// Whether end-of-stream was reached.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    /// Total bytes received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been received yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Index of the first unconsumed byte.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes not yet consumed by a match.
    #[must_use]
    pub fn unconsumed(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Unconsumed output as text (lossy UTF-8 conversion).
    #[must_use]
    pub fn unconsumed_lossy(&self) -> String {
        String::from_utf8_lossy(self.unconsumed()).into_owned()
    }

    /// Everything received so far as text, consumed or not.
    #[must_use]
    pub fn as_str_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Find `pattern` in the unconsumed region without consuming it.
    ///
    /// Positions in the result are absolute.
    #[must_use]
    pub fn find(&self, pattern: &Pattern) -> Option<PatternMatch> {
        pattern.find(self.unconsumed()).map(|m| PatternMatch {
            start: m.start + self.cursor,
            end: m.end + self.cursor,
            captures: m.captures,
        })
    }

    /// Consume up to the end of a match found by [`find`](Self::find).
    pub fn consume(&mut self, found: PatternMatch) -> Match {
        debug_assert!(found.start >= self.cursor && found.end <= self.data.len());

        let before = String::from_utf8_lossy(&self.data[self.cursor..found.start]).into_owned();
        let matched = String::from_utf8_lossy(&self.data[found.start..found.end]).into_owned();
        // An empty match leaves the cursor where it is.
        self.cursor = found.end.max(self.cursor).min(self.data.len());

        Match::new(matched, before, found.start..found.end).with_captures(found.captures)
    }

    /// Find and consume the first occurrence of `pattern`.
    pub fn consume_match(&mut self, pattern: &Pattern) -> Option<Match> {
        let found = self.find(pattern)?;
        Some(self.consume(found))
    }

    /// Consume everything that is left.
    pub fn consume_rest(&mut self) -> String {
        let rest = self.unconsumed_lossy();
        self.cursor = self.data.len();
        rest
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.data.len())
            .field("cursor", &self.cursor)
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn consume_advances_past_match() {
        let mut buf = OutputBuffer::new();
        buf.append(b"cush> echo hello\r\nhello\r\ncush> ");

        let m = buf.consume_match(&Pattern::literal("hello")).expect("first hello");
        assert_eq!(m.before, "cush> echo ");
        assert_eq!(m.range, 11..16);
        assert_eq!(buf.cursor(), 16);

        let m = buf.consume_match(&Pattern::literal("hello")).expect("second hello");
        assert_eq!(m.before, "\r\n");
        assert_eq!(m.range, 18..23);

        assert!(buf.consume_match(&Pattern::literal("hello")).is_none());
        assert_eq!(buf.unconsumed(), b"\r\ncush> ");
    }

    #[test]
    fn match_straddling_appends_is_found() {
        let mut buf = OutputBuffer::new();
        buf.append(b"Host");
        assert!(buf.find(&Pattern::literal("Hostname:")).is_none());
        buf.append(b"name: box\r\n");

        let m = buf.consume_match(&Pattern::literal("Hostname:")).expect("match");
        assert_eq!(m.range, 0..9);
    }

    #[test]
    fn consumed_bytes_are_never_rematched() {
        let mut buf = OutputBuffer::new();
        buf.append(b"cush> ");
        assert!(buf.consume_match(&Pattern::literal("cush> ")).is_some());
        assert!(buf.consume_match(&Pattern::literal("cush> ")).is_none());
        assert!(buf.consume_match(&Pattern::literal("cush")).is_none());
    }

    #[test]
    fn regex_positions_are_absolute() {
        let mut buf = OutputBuffer::new();
        buf.append(b"1: echo hello\r\n2: info\r\n");
        buf.consume_match(&Pattern::literal("hello")).expect("hello");

        let m = buf
            .consume_match(&Pattern::regex(r"(\d+): info").expect("valid regex"))
            .expect("info entry");
        assert_eq!(m.range, 15..22);
        assert_eq!(m.capture(0), Some("2"));
    }

    #[test]
    fn consume_rest_and_eof() {
        let mut buf = OutputBuffer::new();
        buf.append(b"bye\r\n");
        buf.set_eof();
        assert!(buf.is_eof());
        assert_eq!(buf.consume_rest(), "bye\r\n");
        assert!(buf.unconsumed().is_empty());
        assert_eq!(buf.as_str_lossy(), "bye\r\n");
    }

    proptest! {
        #[test]
        fn matches_never_overlap(
            chunks in proptest::collection::vec("[ab]{0,8}", 1..12),
            needle in "[ab]{1,3}",
        ) {
            let pattern = Pattern::literal(needle.clone());
            let mut buf = OutputBuffer::new();
            let mut last_end = 0;

            for chunk in &chunks {
                buf.append(chunk.as_bytes());
                while let Some(m) = buf.consume_match(&pattern) {
                    prop_assert!(m.range.start >= last_end);
                    prop_assert_eq!(m.matched.as_str(), needle.as_str());
                    last_end = m.range.end;
                    prop_assert_eq!(buf.cursor(), last_end);
                }
            }

            // Everything after the last match must be free of the needle.
            prop_assert!(!buf.unconsumed_lossy().contains(&needle));
        }
    }
}
