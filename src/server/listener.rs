// ────────────────────────────────
// src/server/listener.rs
// Encapsulates low‑level TCP bind and accept so the server can be tested on an ephemeral port.
// ────────────────────────────────
use crate::server::conn::Connection;
use anyhow::{Context, Result};
use futures::stream::{self, Stream, StreamExt};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

/// Handshakes allowed in flight before accepting pauses.
const MAX_PENDING_HANDSHAKES: usize = 64;

pub async fn bind_tcp(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    Ok(listener)
}

pub fn plain_incoming(
    listener: TcpListener,
    idle_timeout: Duration,
) -> impl Stream<Item = io::Result<Connection<TcpStream>>> + Send + 'static {
    accepted(listener)
        .map(move |(stream, remote)| Ok(Connection::new(stream, remote, idle_timeout)))
}

/// Completes the TLS handshake off the accept path; failed or slow
/// handshakes are logged and dropped without stopping the server.
pub fn tls_incoming(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    idle_timeout: Duration,
    handshake_timeout: Duration,
) -> impl Stream<Item = io::Result<Connection<TlsStream<TcpStream>>>> + Send + 'static {
    accepted(listener)
        .map(move |(stream, remote)| {
            let acceptor = acceptor.clone();
            async move {
                match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
                    Ok(Ok(tls)) => Some(Connection::new(tls, remote, idle_timeout)),
                    Ok(Err(e)) => {
                        tracing::debug!(%remote, error = %e, "TLS handshake failed");
                        None
                    }
                    Err(_) => {
                        tracing::debug!(%remote, "TLS handshake timed out");
                        None
                    }
                }
            }
        })
        .buffer_unordered(MAX_PENDING_HANDSHAKES)
        .filter_map(|conn| futures::future::ready(conn.map(Ok::<_, io::Error>)))
}

fn accepted(listener: TcpListener) -> impl Stream<Item = (TcpStream, SocketAddr)> + Send {
    stream::unfold(listener, |listener| async move {
        let conn = accept(&listener).await;
        Some((conn, listener))
    })
}

async fn accept(listener: &TcpListener) -> (TcpStream, SocketAddr) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(%remote, error = %e, "failed to set TCP_NODELAY");
                }
                return (stream, remote);
            }
            Err(e) if is_connection_error(&e) => {
                tracing::debug!(error = %e, "accepted connection already failed");
            }
            Err(e) => {
                // Usually descriptor exhaustion; back off instead of spinning.
                tracing::error!(error = %e, "accept failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
