//! Expect pattern matching module.
//!
//! Output from the shell flows one way: the [`Accumulator`] task reads it from
//! the PTY into an [`OutputBuffer`], and the [`Matcher`] scans that buffer for
//! [`Pattern`]s, consuming each match so it can never be returned twice.

mod accumulator;
mod buffer;
mod matcher;
mod pattern;

pub use accumulator::{Accumulator, READ_CHUNK_SIZE};
pub use buffer::OutputBuffer;
pub use matcher::Matcher;
pub use pattern::{CompiledRegex, Pattern, PatternMatch};
