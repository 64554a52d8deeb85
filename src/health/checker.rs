// src/health/checker.rs
use super::context::CheckContext;
use super::status::Status;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A named health check.
///
/// Implementations should watch `ctx` and return early once it is done, but
/// nothing forces them to: a check that overruns its budget and still claims
/// `Ok` is downgraded to `Error` by the runner.
#[async_trait]
pub trait Checker: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, ctx: &CheckContext) -> CheckOutcome;
}

/// What a [`Checker`] reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub status: Status,
    pub message: Option<String>,
}

impl CheckOutcome {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One checker's result for one readiness invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration: String,
}
