// ────────────────────────────────
// src/server/conn.rs
// Accepted connection with its peer address and an idle bound.
// ────────────────────────────────
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{sleep, Instant, Sleep};

/// Fails the connection once no bytes have moved in either direction for
/// the idle timeout. Between requests this is the keep-alive bound.
pub struct Connection<IO> {
    io: IO,
    remote: SocketAddr,
    idle_timeout: Duration,
    idle: Option<Pin<Box<Sleep>>>,
}

impl<IO> Connection<IO> {
    /// A zero `idle_timeout` leaves the connection unbounded.
    pub fn new(io: IO, remote: SocketAddr, idle_timeout: Duration) -> Self {
        let idle = (!idle_timeout.is_zero()).then(|| Box::pin(sleep(idle_timeout)));
        Self {
            io,
            remote,
            idle_timeout,
            idle,
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn touch(&mut self) {
        let deadline = Instant::now().checked_add(self.idle_timeout);
        if let (Some(idle), Some(deadline)) = (self.idle.as_mut(), deadline) {
            idle.as_mut().reset(deadline);
        }
    }

    fn poll_idle<T>(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<T>> {
        let expired = match self.idle.as_mut() {
            Some(idle) => idle.as_mut().poll(cx).is_ready(),
            None => false,
        };
        match expired {
            true => {
                tracing::debug!(
                    remote = %self.remote,
                    timeout = ?self.idle_timeout,
                    "closing idle connection"
                );
                Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection idle timeout",
                )))
            }
            _ => Poll::Pending,
        }
    }
}

impl<IO: AsyncRead + Unpin> AsyncRead for Connection<IO> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.io).poll_read(cx, buf) {
            Poll::Ready(result) => {
                if buf.filled().len() > before {
                    this.touch();
                }
                Poll::Ready(result)
            }
            Poll::Pending => this.poll_idle(cx),
        }
    }
}

impl<IO: AsyncWrite + Unpin> AsyncWrite for Connection<IO> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.io).poll_write(cx, buf) {
            Poll::Ready(Ok(written)) => {
                if written > 0 {
                    this.touch();
                }
                Poll::Ready(Ok(written))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => this.poll_idle(cx),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.io).poll_write_vectored(cx, bufs) {
            Poll::Ready(Ok(written)) => {
                if written > 0 {
                    this.touch();
                }
                Poll::Ready(Ok(written))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => this.poll_idle(cx),
        }
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}
