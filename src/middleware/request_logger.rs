// src/middleware/request_logger.rs
use crate::server::RemoteAddr;
use futures::future::BoxFuture;
use hyper::header::USER_AGENT;
use hyper::{Body, Request, Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Logs one event per request with method, path, status and duration.
#[derive(Debug, Clone, Default)]
pub struct RequestLoggerLayer;

impl RequestLoggerLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestLoggerLayer {
    type Service = RequestLogger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogger { inner }
    }
}

#[derive(Debug, Clone)]
pub struct RequestLogger<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestLogger<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let start = Instant::now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let remote_addr = req
            .extensions()
            .get::<RemoteAddr>()
            .map(|addr| addr.0.to_string())
            .unwrap_or_default();
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let future = self.inner.call(req);
        Box::pin(async move {
            let response = future.await?;
            tracing::info!(
                %method,
                %path,
                status = response.status().as_u16(),
                duration = ?start.elapsed(),
                %remote_addr,
                %user_agent,
                "http request"
            );
            Ok(response)
        })
    }
}
