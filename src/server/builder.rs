// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::problem;
use crate::server::conn::Connection;
use crate::server::listener::{bind_tcp, plain_incoming, tls_incoming};
use crate::server::signal::shutdown_signal;
use crate::server::tls::{load_acceptor, TlsFiles};
use anyhow::{anyhow, bail, Context as _, Result};
use futures::Stream;
use hyper::server::accept;
use hyper::service::make_service_fn;
use hyper::{Body, Request, Response, Server};
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::{Service, ServiceBuilder, ServiceExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_READ_HEADER_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Peer address of the connection a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Builder pattern so `main.rs` can inject its health handler (or any service).
///
/// A zero timeout disables the bound it configures.
pub struct ServerBuilder<H> {
    addr: SocketAddr,
    handler: Option<H>,
    tls: Option<TlsFiles>,
    shutdown_timeout: Duration,
    read_header_timeout: Duration,
    write_timeout: Duration,
    idle_timeout: Duration,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<BoxError>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
            tls: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            read_header_timeout: DEFAULT_READ_HEADER_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Serve HTTPS with the PEM certificate chain and private key at these paths.
    pub fn with_tls(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.tls = Some(TlsFiles {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    /// How long in-flight connections may drain after a shutdown signal.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Bounds reading request headers, and the TLS handshake when serving HTTPS.
    pub fn with_read_header_timeout(mut self, timeout: Duration) -> Self {
        self.read_header_timeout = timeout;
        self
    }

    /// Bounds producing each response; a handler that overruns gets a 503.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// How long a connection may sit without traffic, including between
    /// keep-alive requests.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Bind the listener and load TLS material without serving yet.
    pub async fn bind(self) -> Result<HttpServer<H>> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;
        let tls = match &self.tls {
            Some(files) => Some(load_acceptor(files).await.context("Failed to load TLS config")?),
            None => None,
        };
        let listener = bind_tcp(self.addr).await?;

        Ok(HttpServer {
            listener,
            handler,
            tls,
            settings: ServeSettings {
                shutdown_timeout: self.shutdown_timeout,
                read_header_timeout: self.read_header_timeout,
                write_timeout: self.write_timeout,
                idle_timeout: self.idle_timeout,
            },
        })
    }

    /// Bind and serve until SIGINT or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        self.bind().await?.run().await
    }
}

#[derive(Debug, Clone, Copy)]
struct ServeSettings {
    shutdown_timeout: Duration,
    read_header_timeout: Duration,
    write_timeout: Duration,
    idle_timeout: Duration,
}

impl ServeSettings {
    fn handshake_timeout(&self) -> Duration {
        if self.read_header_timeout.is_zero() {
            DEFAULT_READ_HEADER_TIMEOUT
        } else {
            self.read_header_timeout
        }
    }
}

pub struct HttpServer<H> {
    listener: TcpListener,
    handler: H,
    tls: Option<TlsAcceptor>,
    settings: ServeSettings,
}

impl<H> HttpServer<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<BoxError>,
    H::Future: Send + 'static,
{
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then drain for at most the shutdown timeout.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        let settings = self.settings;

        match self.tls {
            Some(acceptor) => {
                tracing::info!("HTTPS server listening on {}", addr);
                let incoming = tls_incoming(
                    self.listener,
                    acceptor,
                    settings.idle_timeout,
                    settings.handshake_timeout(),
                );
                serve(incoming, self.handler, settings, signal).await
            }
            None => {
                tracing::info!("HTTP server listening on {}", addr);
                let incoming = plain_incoming(self.listener, settings.idle_timeout);
                serve(incoming, self.handler, settings, signal).await
            }
        }
    }
}

async fn serve<S, IO, H, F>(
    incoming: S,
    handler: H,
    settings: ServeSettings,
    signal: F,
) -> Result<()>
where
    S: Stream<Item = io::Result<Connection<IO>>> + Send + 'static,
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<BoxError>,
    H::Future: Send + 'static,
    F: Future<Output = ()>,
{
    let write_timeout = (!settings.write_timeout.is_zero()).then_some(settings.write_timeout);

    let make_service = make_service_fn(move |conn: &Connection<IO>| {
        let remote = RemoteAddr(conn.remote_addr());
        let svc = ServiceBuilder::new()
            .map_result(write_timeout_response)
            .option_layer(write_timeout.map(TimeoutLayer::new))
            .service(handler.clone())
            .map_request(move |mut req: Request<Body>| {
                req.extensions_mut().insert(remote);
                req
            });
        async move { Ok::<_, Infallible>(svc) }
    });

    let mut builder = Server::builder(accept::from_stream(incoming));
    if !settings.read_header_timeout.is_zero() {
        builder = builder.http1_header_read_timeout(settings.read_header_timeout);
    }

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = builder
        .serve(make_service)
        .with_graceful_shutdown(async {
            let _ = stop_rx.await;
        });

    let mut server_task = tokio::spawn(server);

    tokio::select! {
        joined = &mut server_task => {
            joined.context("server task failed")?.context("HTTP server error")?;
            return Ok(());
        }
        _ = signal => {
            tracing::info!(timeout = ?settings.shutdown_timeout, "stopping server");
        }
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(settings.shutdown_timeout, server_task).await {
        Ok(joined) => {
            joined.context("server task failed")?.context("HTTP server error")?;
            tracing::info!("server stopped gracefully");
            Ok(())
        }
        Err(_) => bail!(
            "graceful shutdown did not finish within {:?}",
            settings.shutdown_timeout
        ),
    }
}

fn write_timeout_response(
    result: Result<Response<Body>, BoxError>,
) -> Result<Response<Body>, BoxError> {
    match result {
        Err(err) if err.is::<Elapsed>() => {
            tracing::warn!("response not produced within the write timeout");
            Ok(problem::service_unavailable("response timed out").into_response())
        }
        other => other,
    }
}
