// src/app.rs
// Wires configuration into the middleware-wrapped health service.
use crate::config::{Config, HealthConfig};
use crate::health::{Checker, HealthHandler, HttpChecker};
use crate::metrics::MetricsCollector;
use crate::middleware::{BasicAuthLayer, RecoveryLayer, RequestLoggerLayer, TraceContextLayer};
use anyhow::{Context, Result};
use hyper::{Body, Request, Response};
use reqwest::StatusCode;
use std::sync::Arc;
use tower::util::BoxCloneService;
use tower::ServiceBuilder;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type HttpService = BoxCloneService<Request<Body>, Response<Body>, BoxError>;

/// One [`HttpChecker`] per configured check, sharing a connection pool.
pub fn build_checkers(config: &HealthConfig) -> Result<Vec<Arc<dyn Checker>>> {
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    config
        .checks
        .iter()
        .map(|check| {
            let mut checker =
                HttpChecker::with_client(&check.name, check.url.clone(), client.clone());
            if let Some(code) = check.expected_status {
                let status = StatusCode::from_u16(code).with_context(|| {
                    format!("check {:?}: invalid expected_status {}", check.name, code)
                })?;
                checker = checker.expect_status(status);
            }
            Ok(Arc::new(checker) as Arc<dyn Checker>)
        })
        .collect()
}

/// The health routes behind recovery, trace context, request logging and,
/// when configured, basic auth (outermost first).
pub fn build_service(
    config: &Config,
    checkers: Vec<Arc<dyn Checker>>,
    metrics: Option<Arc<MetricsCollector>>,
) -> HttpService {
    let mut builder = HealthHandler::builder()
        .version(config.health.version.clone())
        .environment(config.health.environment.clone())
        .checkers(checkers)
        .options(config.health.ready_options());
    if let Some(metrics) = metrics {
        builder = builder.metrics(metrics);
    }

    let auth = config
        .auth
        .as_ref()
        .map(|auth| BasicAuthLayer::new(&auth.username, &auth.password, auth.realm.as_deref()));

    let service = ServiceBuilder::new()
        .layer(RecoveryLayer::new())
        .layer(TraceContextLayer::new())
        .layer(RequestLoggerLayer::new())
        .option_layer(auth)
        .service(builder.build());

    BoxCloneService::new(service)
}
