use accrual_core::{ConfigError, SourceError};

use super::types::RunSummary;

/// Accrual job failure.
///
/// Only source failures and setup problems stop a run early. Posting failures
/// surface here solely under `FailurePolicy::FailAggregate`, after the whole
/// population was processed.
#[derive(Debug, thiserror::Error)]
pub enum AccrualJobError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no execution context attached to the calling thread")]
    MissingContext,

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),

    #[error("account source failed: {0}")]
    Source(#[from] SourceError),

    #[error(
        "{} account(s) failed to post and {} task(s) were interrupted",
        .0.accounts_failed,
        .0.tasks_interrupted
    )]
    PostingFailures(Box<RunSummary>),

    #[error("unknown job: {0}")]
    UnknownJob(String),
}
