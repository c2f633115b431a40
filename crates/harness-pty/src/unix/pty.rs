//! Unix PTY allocation and the async master handle.

use std::io;
use std::os::unix::io::{AsRawFd, OwnedFd};
use std::pin::Pin;
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result, os_error};

/// Unix PTY master implementation.
///
/// Wraps the master descriptor in an [`AsyncFd`]. Shutting the master down
/// drops the descriptor, after which reads report EOF and writes fail.
pub struct UnixPtyMaster {
    async_fd: Option<AsyncFd<OwnedFd>>,
}

impl std::fmt::Debug for UnixPtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyMaster")
            .field("fd", &self.async_fd.as_ref().map(AsRawFd::as_raw_fd))
            .finish()
    }
}

impl UnixPtyMaster {
    /// Allocate a new PTY pair and return the master side with the slave path.
    ///
    /// The master descriptor is non-blocking and close-on-exec so it never
    /// leaks into children spawned by other sessions.
    pub fn open() -> Result<(Self, String)> {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY | OpenptFlags::CLOEXEC)
            .map_err(|e| PtyError::Create(os_error(e)))?;

        grantpt(&master_fd).map_err(|e| PtyError::Create(os_error(e)))?;
        unlockpt(&master_fd).map_err(|e| PtyError::Create(os_error(e)))?;

        let slave_name =
            ptsname(&master_fd, Vec::new()).map_err(|e| PtyError::Create(os_error(e)))?;
        let slave_path = slave_name
            .to_str()
            .map_err(|_| {
                PtyError::Create(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "invalid slave path encoding",
                ))
            })?
            .to_string();

        fcntl_setfl(&master_fd, OFlags::NONBLOCK).map_err(|e| PtyError::Create(os_error(e)))?;

        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((
            Self {
                async_fd: Some(async_fd),
            },
            slave_path,
        ))
    }

    fn fd(&self) -> Result<&AsyncFd<OwnedFd>> {
        self.async_fd.as_ref().ok_or(PtyError::Closed)
    }

    /// Set the window size.
    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        tcsetwinsize(self.fd()?.get_ref(), winsize).map_err(|e| PtyError::Resize(os_error(e)))
    }
}

impl AsyncRead for UnixPtyMaster {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let Some(async_fd) = self.async_fd.as_ref() else {
            return Poll::Ready(Ok(())); // EOF
        };

        loop {
            let mut guard = match async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(async_fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                // Linux reports a hung-up slave as EIO rather than a zero read.
                Err(rustix::io::Errno::IO) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(os_error(e))),
            }
        }
    }
}

impl AsyncWrite for UnixPtyMaster {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let Some(async_fd) = self.async_fd.as_ref() else {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "PTY closed")));
        };

        loop {
            let mut guard = match async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(rustix::io::Errno::IO) => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "PTY slave closed",
                    )));
                }
                Err(e) => return Poll::Ready(Err(os_error(e))),
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.async_fd = None;
        Poll::Ready(Ok(()))
    }
}

/// Open the slave side of a PTY, close-on-exec.
pub fn open_slave(path: &str) -> Result<OwnedFd> {
    open(
        path,
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|e| PtyError::Create(os_error(e)))
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn open_pty() {
        let (_master, slave_path) = UnixPtyMaster::open().expect("open PTY");
        assert!(slave_path.starts_with("/dev/pts/") || slave_path.starts_with("/dev/tty"));
    }

    #[tokio::test]
    async fn set_window_size_reaches_the_terminal() {
        let (master, _) = UnixPtyMaster::open().expect("open PTY");

        master
            .set_window_size(WindowSize::new(120, 40))
            .expect("set window size");

        let winsize = rustix::termios::tcgetwinsize(master.fd().expect("open").get_ref())
            .expect("get window size");
        assert_eq!((winsize.ws_col, winsize.ws_row), (120, 40));
    }

    #[tokio::test]
    async fn shut_down_master_reads_eof_and_rejects_writes() {
        let (mut master, _) = UnixPtyMaster::open().expect("open PTY");
        master.shutdown().await.expect("shutdown");

        let mut buf = [0u8; 16];
        assert_eq!(master.read(&mut buf).await.expect("read"), 0);

        let err = master.write_all(b"x").await.expect_err("write after shutdown");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(matches!(
            master.set_window_size(WindowSize::new(80, 24)),
            Err(PtyError::Closed)
        ));
    }

    #[tokio::test]
    async fn slave_hangup_reads_as_eof() {
        let (mut master, slave_path) = UnixPtyMaster::open().expect("open PTY");
        let slave = open_slave(&slave_path).expect("open slave");
        rustix::io::write(&slave, b"bye").expect("write to slave");
        drop(slave);

        let mut output = Vec::new();
        master.read_to_end(&mut output).await.expect("read to EOF");
        assert_eq!(output, b"bye");
    }
}
