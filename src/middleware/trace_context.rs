// src/middleware/trace_context.rs
//! W3C Trace Context propagation.
//!
//! An incoming valid `traceparent` keeps its trace id and flags and gets a
//! fresh child span id; anything else starts a new sampled trace. The result
//! is echoed in the response headers, stored in the request extensions, and
//! recorded on a `tracing` span wrapping the rest of the request, so every log
//! event emitted while handling it carries `trace_id`, `span_id` and
//! `trace_flags`.

use futures::future::BoxFuture;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Body, Request, Response};
use std::fmt;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

pub const TRACEPARENT: HeaderName = HeaderName::from_static("traceparent");
pub const TRACESTATE: HeaderName = HeaderName::from_static("tracestate");

const VERSION: &str = "00";
const TRACE_ID_LEN: usize = 32;
const SPAN_ID_LEN: usize = 16;
const FLAGS_LEN: usize = 2;
const FLAG_SAMPLED: &str = "01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub version: String,
    pub trace_id: String,
    pub span_id: String,
    pub trace_flags: String,
    pub trace_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceparentError {
    #[error("expected 4 parts, got {0}")]
    Parts(usize),

    #[error("unsupported version {0:?}")]
    Version(String),

    #[error("invalid {field}: {reason}")]
    Field { field: &'static str, reason: &'static str },
}

impl TraceContext {
    /// A new sampled trace with random ids.
    pub fn generate() -> Self {
        Self {
            version: VERSION.to_string(),
            trace_id: generate_trace_id(),
            span_id: generate_span_id(),
            trace_flags: FLAG_SAMPLED.to_string(),
            trace_state: None,
        }
    }

    /// Parse a `traceparent` header value.
    pub fn parse(traceparent: &str) -> Result<Self, TraceparentError> {
        let parts: Vec<&str> = traceparent.split('-').collect();
        let [version, trace_id, span_id, flags] = parts[..] else {
            return Err(TraceparentError::Parts(parts.len()));
        };

        if version != VERSION {
            return Err(TraceparentError::Version(version.to_string()));
        }
        validate_field("trace-id", trace_id, TRACE_ID_LEN, false)?;
        validate_field("span-id", span_id, SPAN_ID_LEN, false)?;
        validate_field("trace-flags", flags, FLAGS_LEN, true)?;

        Ok(Self {
            version: version.to_string(),
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            trace_flags: flags.to_string(),
            trace_state: None,
        })
    }

    /// Continue the trace described by the request headers, or start a new one.
    pub fn from_headers(headers: &hyper::HeaderMap) -> Self {
        let parent = headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| match Self::parse(v) {
                Ok(parent) => Some(parent),
                Err(err) => {
                    tracing::debug!(%err, "ignoring invalid traceparent");
                    None
                }
            });

        match parent {
            Some(parent) => Self {
                span_id: generate_span_id(),
                trace_state: headers
                    .get(TRACESTATE)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
                ..parent
            },
            None => Self::generate(),
        }
    }

    /// The context stored on a request by [`TraceContextLayer`].
    pub fn current<B>(req: &Request<B>) -> Option<&TraceContext> {
        req.extensions().get::<TraceContext>()
    }

    pub fn traceparent(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.version, self.trace_id, self.span_id, self.trace_flags
        )
    }
}

fn validate_field(
    field: &'static str,
    value: &str,
    len: usize,
    zero_allowed: bool,
) -> Result<(), TraceparentError> {
    if value.len() != len {
        return Err(TraceparentError::Field { field, reason: "wrong length" });
    }
    if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(TraceparentError::Field { field, reason: "not lowercase hex" });
    }
    if !zero_allowed && value.bytes().all(|b| b == b'0') {
        return Err(TraceparentError::Field { field, reason: "all zeros" });
    }
    Ok(())
}

fn generate_trace_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn generate_span_id() -> String {
    let id = loop {
        let candidate: u64 = rand::random();
        if candidate != 0 {
            break candidate;
        }
    };
    format!("{:016x}", id)
}

#[derive(Debug, Clone, Default)]
pub struct TraceContextLayer;

impl TraceContextLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TraceContextLayer {
    type Service = TraceContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceContextService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct TraceContextService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TraceContextService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let trace = TraceContext::from_headers(req.headers());
        let span = tracing::info_span!(
            "request",
            trace_id = %trace.trace_id,
            span_id = %trace.span_id,
            trace_flags = %trace.trace_flags,
        );

        let traceparent = HeaderValue::from_str(&trace.traceparent()).ok();
        let tracestate = trace
            .trace_state
            .as_deref()
            .and_then(|s| HeaderValue::from_str(s).ok());
        req.extensions_mut().insert(trace);

        let future = self.inner.call(req);
        Box::pin(
            async move {
                let mut response = future.await?;
                let headers = response.headers_mut();
                if let Some(value) = traceparent {
                    headers.insert(TRACEPARENT, value);
                }
                if let Some(value) = tracestate {
                    headers.insert(TRACESTATE, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
