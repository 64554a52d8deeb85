// src/health/testing.rs
// Checkers with scripted behavior for unit tests.
use super::checker::{CheckOutcome, Checker};
use super::context::CheckContext;
use super::status::Status;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub struct MockChecker {
    pub name: String,
    pub status: Status,
    pub message: Option<String>,
    pub delay: Duration,
    /// Whether the delay races against the context.
    pub cooperative: bool,
}

impl MockChecker {
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: Status::Ok,
            message: None,
            delay: Duration::ZERO,
            cooperative: true,
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            status: Status::Error,
            message: Some(message.to_string()),
            ..Self::ok(name)
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn ignoring_context(mut self) -> Self {
        self.cooperative = false;
        self
    }

    pub fn shared(self) -> Arc<dyn Checker> {
        Arc::new(self)
    }
}

#[async_trait]
impl Checker for MockChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        if !self.delay.is_zero() {
            if self.cooperative {
                tokio::select! {
                    _ = sleep(self.delay) => {}
                    _ = ctx.done() => return CheckOutcome::error("check timed out"),
                }
            } else {
                sleep(self.delay).await;
            }
        }

        CheckOutcome {
            status: self.status,
            message: self.message.clone(),
        }
    }
}
