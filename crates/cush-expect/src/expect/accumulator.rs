//! Background output accumulator.
//!
//! A single task drains the PTY master into an [`OutputBuffer`] for the whole
//! life of a session, so the shell never blocks on a full PTY even while the
//! script is between expectations. Each append bumps a version counter on a
//! `watch` channel; [`Matcher`] waits on that counter instead of polling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::buffer::OutputBuffer;
use super::matcher::Matcher;

/// Size of each read from the PTY master.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Shared handle to the output buffer.
pub(crate) type SharedBuffer = Arc<Mutex<OutputBuffer>>;

/// Lock the shared buffer, recovering from a poisoned mutex.
///
/// The buffer is only ever appended to or has its cursor advanced, so a panic
/// while holding the lock cannot leave it inconsistent.
pub(crate) fn lock(buffer: &SharedBuffer) -> MutexGuard<'_, OutputBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the background read task.
///
/// Dropping the accumulator aborts the task.
#[derive(Debug)]
pub struct Accumulator {
    task: Option<JoinHandle<()>>,
    buffer: SharedBuffer,
}

impl Accumulator {
    /// Start draining `reader` and return the accumulator with its matcher.
    ///
    /// Every chunk read is also appended to `transcript` when one is given.
    /// Must be called from within a Tokio runtime.
    pub fn start<R>(reader: R, transcript: Option<tokio::fs::File>) -> (Self, Matcher)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer: SharedBuffer = Arc::new(Mutex::new(OutputBuffer::new()));
        let (version_tx, version_rx) = watch::channel(0u64);

        let task = tokio::spawn(read_loop(reader, Arc::clone(&buffer), version_tx, transcript));

        let matcher = Matcher::new(Arc::clone(&buffer), version_rx);
        (
            Self {
                task: Some(task),
                buffer,
            },
            matcher,
        )
    }

    /// Whether the read task has finished (end-of-stream or stopped).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Everything received so far.
    #[must_use]
    pub fn output(&self) -> String {
        lock(&self.buffer).as_str_lossy()
    }

    /// Stop the read task and wait for it to go away.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // A cancelled or panicked task both mean it is gone.
            let _ = task.await;
        }
    }
}

impl Drop for Accumulator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn read_loop<R>(
    mut reader: R,
    buffer: SharedBuffer,
    version: watch::Sender<u64>,
    mut transcript: Option<tokio::fs::File>,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => {
                tracing::debug!("shell output reached end of stream");
                break;
            }
            Ok(n) => {
                lock(&buffer).append(&chunk[..n]);
                version.send_modify(|v| *v = v.wrapping_add(1));
                tracing::trace!(bytes = n, "read shell output");

                if let Some(file) = transcript.as_mut() {
                    if let Err(e) = file.write_all(&chunk[..n]).await {
                        tracing::warn!(error = %e, "transcript write failed; disabling transcript");
                        transcript = None;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::debug!(error = %e, "shell output read failed; treating as end of stream");
                break;
            }
        }
    }

    if let Some(mut file) = transcript {
        let _ = file.flush().await;
    }

    lock(&buffer).set_eof();
    version.send_modify(|v| *v = v.wrapping_add(1));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn accumulates_until_eof() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let (accumulator, mut matcher) = Accumulator::start(reader, None);

        writer.write_all(b"cush> ").await.unwrap();
        writer.write_all(b"hello\r\n").await.unwrap();
        drop(writer);

        let rest = matcher
            .expect_eof(Duration::from_secs(5))
            .await
            .expect("stream should end");
        assert_eq!(rest, "cush> hello\r\n");
        assert_eq!(accumulator.output(), "cush> hello\r\n");

        tokio::time::timeout(Duration::from_secs(5), async {
            while !accumulator.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("read task should finish after eof");
    }

    #[tokio::test]
    async fn drains_more_than_one_chunk() {
        let (mut writer, reader) = tokio::io::duplex(1024);
        let (accumulator, mut matcher) = Accumulator::start(reader, None);

        let payload = vec![b'x'; READ_CHUNK_SIZE * 3];
        writer.write_all(&payload).await.unwrap();
        writer.write_all(b"END").await.unwrap();

        matcher
            .expect(&"END".into(), Duration::from_secs(5))
            .await
            .expect("marker after large output");
        assert_eq!(accumulator.output().len(), READ_CHUNK_SIZE * 3 + 3);
    }

    #[tokio::test]
    async fn writes_transcript() {
        let dir = std::env::temp_dir().join(format!("cush-transcript-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("session.log");
        let file = tokio::fs::File::create(&path).await.unwrap();

        let (mut writer, reader) = tokio::io::duplex(64);
        let (_accumulator, mut matcher) = Accumulator::start(reader, Some(file));

        writer.write_all(b"Hostname: box\r\n").await.unwrap();
        drop(writer);
        matcher.expect_eof(Duration::from_secs(5)).await.unwrap();

        // File writes go through the blocking pool and may land a little later.
        let mut contents = String::new();
        for _ in 0..50 {
            contents = tokio::fs::read_to_string(&path).await.unwrap();
            if !contents.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(contents, "Hostname: box\r\n");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (_writer, reader) = tokio::io::duplex(64);
        let (mut accumulator, _matcher) = Accumulator::start(reader, None);
        accumulator.stop().await;
        accumulator.stop().await;
        assert!(accumulator.is_finished());
    }
}
