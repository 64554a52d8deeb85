// src/health/handler.rs
use super::checker::Checker;
use super::context::CheckContext;
use super::live::LivenessResponder;
use super::ready::{ReadinessAggregator, ReadyOptions};
use super::render::{render_live, render_ready, LIVE_ROUTE, READY_ROUTE};
use crate::metrics::MetricsCollector;
use crate::problem;
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Body, Method, Request, Response};
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// Serves `GET /health/live` and `GET /health/ready`; `HEAD` gets the same
/// status and headers without a body.
#[derive(Clone)]
pub struct HealthHandler {
    live: Arc<LivenessResponder>,
    ready: Arc<ReadinessAggregator>,
}

impl HealthHandler {
    pub fn builder() -> HealthHandlerBuilder {
        HealthHandlerBuilder::default()
    }

    pub fn readiness(&self) -> &ReadinessAggregator {
        &self.ready
    }

    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let path = req.uri().path();
        if path != LIVE_ROUTE && path != READY_ROUTE {
            return problem::not_found(format!("no route for {}", path))
                .with_instance(path)
                .into_response();
        }

        let head = req.method() == Method::HEAD;
        if req.method() != Method::GET && !head {
            let mut response = problem::method_not_allowed(format!(
                "{} is not allowed on {}",
                req.method(),
                path
            ))
            .into_response();
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let mut response = if path == LIVE_ROUTE {
            render_live(&self.live.respond())
        } else {
            let response = self.ready.evaluate(&CheckContext::background()).await;
            render_ready(&response)
        };
        if head {
            *response.body_mut() = Body::empty();
        }
        response
    }
}

impl Service<Request<Body>> for HealthHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        Box::pin(async move { Ok(handler.handle(req).await) })
    }
}

#[derive(Default)]
pub struct HealthHandlerBuilder {
    version: String,
    environment: String,
    checkers: Vec<Arc<dyn Checker>>,
    options: ReadyOptions,
    metrics: Option<Arc<MetricsCollector>>,
}

impl HealthHandlerBuilder {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn checker(mut self, checker: Arc<dyn Checker>) -> Self {
        self.checkers.push(checker);
        self
    }

    pub fn checkers<I>(mut self, checkers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Checker>>,
    {
        self.checkers.extend(checkers);
        self
    }

    pub fn options(mut self, options: ReadyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> HealthHandler {
        let mut seen = HashSet::new();
        for checker in &self.checkers {
            if !seen.insert(checker.name().to_string()) {
                tracing::warn!(check = checker.name(), "duplicate checker name");
            }
        }

        tracing::info!(
            checks = self.checkers.len(),
            overall_timeout = ?self.options.overall_timeout,
            per_check_timeout = ?self.options.per_check_timeout,
            "health handler configured"
        );

        let live = LivenessResponder::new(self.version.clone(), self.environment.clone());
        let ready = ReadinessAggregator::new(
            self.checkers,
            self.options,
            self.version,
            self.environment,
            self.metrics,
        );

        HealthHandler {
            live: Arc::new(live),
            ready: Arc::new(ready),
        }
    }
}
