// src/main.rs
use anyhow::Result;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use vital::{
    app,
    config::{self, Config, LogFormat},
    metrics::MetricsRegistry,
    server::ServerBuilder,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = config::load_config(&config_path).await?;

    init_tracing(config.logging.format)?;
    info!("Loaded configuration from: {}", config_path);

    // Initialize metrics
    let metrics = if config.metrics.enabled {
        let registry = MetricsRegistry::new()?;
        let collector = registry.collector();
        let metrics_addr: SocketAddr = (config.server.host, config.metrics.port).into();
        start_metrics_server(metrics_addr, registry, config.metrics.path.clone()).await?;
        Some(collector)
    } else {
        None
    };

    let checkers = app::build_checkers(&config.health)?;
    let service = app::build_service(&config, checkers, metrics);

    serve(&config, service).await
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new("vital=info,hyper=info")
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

async fn serve(config: &Config, service: app::HttpService) -> Result<()> {
    info!(
        tls = config.server.tls.is_some(),
        "Starting health server on {}",
        config.server.addr()
    );

    let mut builder = ServerBuilder::new(config.server.addr())
        .with_handler(service)
        .with_shutdown_timeout(config.server.shutdown_timeout())
        .with_read_header_timeout(config.server.read_header_timeout())
        .with_write_timeout(config.server.write_timeout())
        .with_idle_timeout(config.server.idle_timeout());
    if let Some(tls) = &config.server.tls {
        builder = builder.with_tls(tls.cert_path.clone(), tls.key_path.clone());
    }

    builder.serve().await
}

async fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path); // keep this for logging
    let service_path = metrics_path.clone(); // clone for the service closure

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    if req.uri().path() != path.as_str() {
                        return Ok::<_, Infallible>(plain(StatusCode::NOT_FOUND, "Not Found"));
                    }

                    match registry.gather() {
                        Ok(metrics) => {
                            let mut response = Response::new(Body::from(metrics));
                            response.headers_mut().insert(
                                CONTENT_TYPE,
                                HeaderValue::from_static("text/plain; version=0.0.4"),
                            );
                            Ok(response)
                        }
                        Err(e) => {
                            error!("Failed to encode metrics: {}", e);
                            Ok(plain(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable"))
                        }
                    }
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}
