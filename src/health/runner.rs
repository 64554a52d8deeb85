// src/health/runner.rs
use super::checker::{CheckResult, Checker};
use super::context::CheckContext;
use super::status::Status;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Run one checker under `ctx`, optionally narrowed by `per_check_timeout`,
/// and fold every outcome into a [`CheckResult`].
///
/// The runner, not the checker, decides whether the budget held: a checker
/// that reports `Ok` after its context ended is recorded as `Error`, with the
/// context error appended to whatever message it gave.
pub async fn run_check(
    checker: &dyn Checker,
    ctx: &CheckContext,
    per_check_timeout: Option<Duration>,
) -> CheckResult {
    run_check_timed(checker, ctx, per_check_timeout).await.0
}

/// [`run_check`], also returning the measured elapsed time.
pub(crate) async fn run_check_timed(
    checker: &dyn Checker,
    ctx: &CheckContext,
    per_check_timeout: Option<Duration>,
) -> (CheckResult, Duration) {
    let start = Instant::now();
    let check_ctx = match per_check_timeout {
        Some(budget) if !budget.is_zero() => ctx.with_timeout(budget),
        _ => ctx.clone(),
    };

    let outcome = checker.check(&check_ctx).await;
    let mut status = outcome.status;
    let mut message = outcome.message.filter(|m| !m.is_empty());

    if let Some(err) = check_ctx.err() {
        if status == Status::Ok {
            warn!(check = checker.name(), %err, "check reported ok after its context ended");
            status = Status::Error;
            message = Some(match message {
                Some(own) => format!("{own}; {err}"),
                None => err.to_string(),
            });
        }
    }

    let elapsed = start.elapsed();
    debug!(
        check = checker.name(),
        %status,
        elapsed = ?elapsed,
        "check finished"
    );

    let result = CheckResult {
        name: checker.name().to_string(),
        status,
        message,
        duration: format!("{:?}", elapsed),
    };
    (result, elapsed)
}
