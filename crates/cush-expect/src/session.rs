//! Session module for managing the shell under test.
//!
//! A [`Session`] owns one shell process, the PTY it runs on, and the
//! background task that accumulates its output. It offers the async
//! primitives the blocking [`TestRun`](crate::TestRun) facade is built on:
//!
//! - [`Session::send`], [`Session::send_line`] and [`Session::send_control`]
//! - [`Session::expect`], [`Session::expect_timeout`] and [`Session::expect_eof`]
//! - [`Session::terminate`]
//!
//! # Example
//!
//! ```ignore
//! use cush_expect::{HarnessConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cush_expect::ExpectError> {
//!     let mut session = Session::spawn(&HarnessConfig::new("./cush")).await?;
//!     session.expect("cush> ").await?;
//!     session.send_line("info").await?;
//!     session.expect("Hostname:").await?;
//!     session.terminate().await?;
//!     Ok(())
//! }
//! ```

mod handle;

pub use handle::Session;
