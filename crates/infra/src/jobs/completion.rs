//! Post-round inspection of task outcomes.

use tracing::{error, trace, warn};

use accrual_core::{ExecutionContext, SourceError};

use super::types::{TaskKind, TaskOutcome, TaskStatus};

/// What a round left behind, once logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundCheck {
    pub accounts_failed: u64,
    pub tasks_interrupted: u64,
    /// Set when the look-ahead fetch could not read from the source
    pub fetch_error: Option<SourceError>,
}

/// Logs every failure of a finished round without ever failing the round.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompletionChecker;

impl CompletionChecker {
    pub fn check(ctx: &ExecutionContext, outcomes: &[TaskOutcome]) -> RoundCheck {
        let mut check = RoundCheck::default();

        for outcome in outcomes {
            let round = outcome.round;
            let task = outcome.kind;
            match &outcome.status {
                TaskStatus::Done => {
                    trace!(round, task = %task, "task completed");
                }
                TaskStatus::Failed(failures) => {
                    for failure in failures {
                        error!(
                            tenant = %ctx.tenant_identifier(),
                            round,
                            task = %task,
                            account = %failure.account,
                            error = %failure.error,
                            "failed to post accrued interest"
                        );
                    }
                    warn!(
                        tenant = %ctx.tenant_identifier(),
                        round,
                        task = %task,
                        failed = failures.len(),
                        "batch finished with failures"
                    );
                    check.accounts_failed += failures.len() as u64;
                }
                TaskStatus::FetchFailed(err) => {
                    error!(
                        tenant = %ctx.tenant_identifier(),
                        round,
                        error = %err,
                        "look-ahead fetch failed"
                    );
                    if check.fetch_error.is_none() {
                        check.fetch_error = Some(err.clone());
                    }
                }
                TaskStatus::Interrupted(reason) => {
                    error!(
                        tenant = %ctx.tenant_identifier(),
                        round,
                        task = %task,
                        reason = %reason,
                        "task interrupted"
                    );
                    check.tasks_interrupted += 1;
                    if matches!(task, TaskKind::Fetch) {
                        // The buffer may be half-filled; the orchestrator's
                        // fallback fetch covers it.
                        warn!(round, "look-ahead fetch did not complete");
                    }
                }
            }
        }

        check
    }
}
