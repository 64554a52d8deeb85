// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use vital::health::{CheckContext, CheckOutcome, Checker};

pub struct ScriptedChecker {
    name: String,
    outcome: CheckOutcome,
    delay: Duration,
    cooperative: bool,
}

impl ScriptedChecker {
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            outcome: CheckOutcome::ok(),
            delay: Duration::ZERO,
            cooperative: true,
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            outcome: CheckOutcome::error(message),
            ..Self::ok(name)
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
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
impl Checker for ScriptedChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CheckContext) -> CheckOutcome {
        if self.cooperative {
            tokio::select! {
                _ = sleep(self.delay) => {}
                err = ctx.done() => return CheckOutcome::error(format!("check timed out: {err}")),
            }
        } else {
            sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// Parses the `Debug` rendering of a `Duration`.
pub fn parse_duration(text: &str) -> Option<Duration> {
    let split = text.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (value, unit) = text.split_at(split);
    let value: f64 = value.parse().ok()?;
    let nanos_per_unit = match unit {
        "s" => 1e9,
        "ms" => 1e6,
        "µs" => 1e3,
        "ns" => 1.0,
        _ => return None,
    };
    Some(Duration::from_nanos((value * nanos_per_unit).round() as u64))
}
