// src/health/ready.rs
use super::checker::{CheckResult, Checker};
use super::context::CheckContext;
use super::runner::run_check_timed;
use super::status::Status;
use crate::metrics::MetricsCollector;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::panic::resume_unwind;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_PER_CHECK_TIMEOUT: Duration = Duration::from_millis(800);

/// Time budgets for one readiness evaluation.
///
/// A zero `overall_timeout` imposes no deadline at all, so a slow checker can
/// hold the response indefinitely. A missing or zero `per_check_timeout`
/// leaves each check under the overall budget only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyOptions {
    pub overall_timeout: Duration,
    pub per_check_timeout: Option<Duration>,
}

impl Default for ReadyOptions {
    fn default() -> Self {
        Self {
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
            per_check_timeout: Some(DEFAULT_PER_CHECK_TIMEOUT),
        }
    }
}

impl ReadyOptions {
    pub fn unbounded() -> Self {
        Self {
            overall_timeout: Duration::ZERO,
            per_check_timeout: None,
        }
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_per_check_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.per_check_timeout = timeout;
        self
    }

    fn per_check(&self) -> Option<Duration> {
        self.per_check_timeout.filter(|t| !t.is_zero())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub status: Status,
    pub checks: Vec<CheckResult>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,
}

/// Fans every checker out onto its own task and folds the results.
pub struct ReadinessAggregator {
    checkers: Arc<[Arc<dyn Checker>]>,
    options: ReadyOptions,
    version: String,
    environment: String,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ReadinessAggregator {
    pub fn new(
        checkers: Vec<Arc<dyn Checker>>,
        options: ReadyOptions,
        version: impl Into<String>,
        environment: impl Into<String>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        Self {
            checkers: checkers.into(),
            options,
            version: version.into(),
            environment: environment.into(),
            metrics,
        }
    }

    pub fn options(&self) -> ReadyOptions {
        self.options
    }

    pub fn checker_names(&self) -> Vec<&str> {
        self.checkers.iter().map(|c| c.name()).collect()
    }

    /// Run every checker once under `parent` and reduce the results.
    ///
    /// Waits for all checks even after the overall deadline has passed; the
    /// deadline only shapes the status each check is given. A panicking
    /// checker is not absorbed here: its panic resumes on the calling task.
    pub async fn evaluate(&self, parent: &CheckContext) -> ReadyResponse {
        let ctx = if self.options.overall_timeout.is_zero() {
            parent.child()
        } else {
            parent.with_timeout(self.options.overall_timeout)
        };
        // Stop any check still watching the context once we return or are dropped.
        let _cancel = ctx.cancel_on_drop();
        let per_check = self.options.per_check();

        // Handles are joined in dispatch order, so result i belongs to checker i
        // however the tasks finish.
        let handles: Vec<_> = self
            .checkers
            .iter()
            .map(|checker| {
                let checker = checker.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    run_check_timed(checker.as_ref(), &ctx, per_check).await
                })
            })
            .collect();

        let joined = join_all(handles).await;
        let mut checks = Vec::with_capacity(joined.len());

        for (checker, outcome) in self.checkers.iter().zip(joined) {
            let (result, elapsed) = match outcome {
                Ok(timed) => timed,
                Err(e) if e.is_panic() => resume_unwind(e.into_panic()),
                Err(e) => {
                    error!(check = checker.name(), %e, "check task did not complete");
                    let result = CheckResult {
                        name: checker.name().to_string(),
                        status: Status::Error,
                        message: Some(format!("check aborted: {}", e)),
                        duration: format!("{:?}", Duration::ZERO),
                    };
                    (result, Duration::ZERO)
                }
            };

            if let Some(metrics) = &self.metrics {
                metrics.record_check(&result.name, result.status, elapsed);
            }
            checks.push(result);
        }

        let status = Status::aggregate(checks.iter().map(|c| c.status));
        if let Some(metrics) = &self.metrics {
            metrics.update_ready_status(status);
        }

        if status.is_ok() {
            debug!(checks = checks.len(), "readiness ok");
        } else {
            let failed: Vec<&str> = checks
                .iter()
                .filter(|c| !c.status.is_ok())
                .map(|c| c.name.as_str())
                .collect();
            info!(?failed, "readiness failed");
        }

        ReadyResponse {
            status,
            checks,
            version: self.version.clone(),
            environment: self.environment.clone(),
        }
    }
}
