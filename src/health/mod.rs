// src/health/mod.rs
mod checker;
mod context;
mod handler;
mod http;
mod live;
mod ready;
mod render;
mod runner;
mod status;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::{CheckOutcome, CheckResult, Checker};
pub use context::{CheckContext, ContextError};
pub use handler::{HealthHandler, HealthHandlerBuilder};
pub use http::HttpChecker;
pub use live::{LiveResponse, LivenessResponder};
pub use ready::{
    ReadinessAggregator, ReadyOptions, ReadyResponse, DEFAULT_OVERALL_TIMEOUT,
    DEFAULT_PER_CHECK_TIMEOUT,
};
pub use render::{
    disable_response_cache, render_json, render_live, render_ready, LIVE_ROUTE, READY_ROUTE,
};
pub use runner::run_check;
pub use status::Status;
