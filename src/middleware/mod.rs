// src/middleware/mod.rs
mod basic_auth;
mod recovery;
mod request_logger;
mod trace_context;

pub use basic_auth::{BasicAuth, BasicAuthLayer};
pub use recovery::{Recovery, RecoveryLayer};
pub use request_logger::{RequestLogger, RequestLoggerLayer};
pub use trace_context::{
    TraceContext, TraceContextLayer, TraceContextService, TraceparentError, TRACEPARENT, TRACESTATE,
};
