//! Run state, task outcomes and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use accrual_core::{AccountId, Batch, PostingError, SourceError};

/// Orchestrator state.
///
/// `Idle → Fetching → Dispatching → Awaiting → Checking → (Dispatching | Drained)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    /// Synchronous fetch of the first page
    Fetching,
    /// Partitioning the current page and submitting the round
    Dispatching,
    /// Blocked on the round barrier
    Awaiting,
    /// Inspecting outcomes and selecting the next page
    Checking,
    /// Source exhausted; terminal
    Drained,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Drained)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Dispatching)
                | (Fetching, Drained)
                | (Dispatching, Awaiting)
                | (Awaiting, Checking)
                | (Checking, Dispatching)
                | (Checking, Drained)
        )
    }
}

impl core::fmt::Display for RunState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Dispatching => "dispatching",
            RunState::Awaiting => "awaiting",
            RunState::Checking => "checking",
            RunState::Drained => "drained",
        };
        f.write_str(name)
    }
}

/// Which task of a round an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Look-ahead page fetch
    Fetch,
    /// Posting of one batch
    Posting {
        batch: usize,
        first: AccountId,
        last: AccountId,
        len: usize,
    },
}

impl TaskKind {
    /// Describe a posting batch; `None` for an empty batch, which is never dispatched.
    pub fn posting(batch: &Batch<'_>) -> Option<Self> {
        Some(TaskKind::Posting {
            batch: batch.index(),
            first: batch.first()?,
            last: batch.last()?,
            len: batch.len(),
        })
    }
}

impl core::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TaskKind::Fetch => f.write_str("fetch"),
            TaskKind::Posting {
                batch, first, last, ..
            } => write!(f, "batch#{batch}[{first}..={last}]"),
        }
    }
}

/// One account that failed to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFailure {
    pub account: AccountId,
    pub error: PostingError,
}

/// Terminal status of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Done,
    /// Every account was attempted; these ones failed
    Failed(Vec<AccountFailure>),
    /// The look-ahead fetch could not read from the source
    FetchFailed(SourceError),
    /// The worker panicked before the task finished
    Interrupted(String),
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

/// Terminal outcome of one task of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub round: u64,
    pub kind: TaskKind,
    pub status: TaskStatus,
}

/// Aggregate of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub tenant: String,
    pub rounds: u64,
    pub pages: u64,
    pub accounts_dispatched: u64,
    pub accounts_failed: u64,
    pub tasks_interrupted: u64,
    pub fallback_fetches: u64,
    /// High-water mark of the prefetch buffer
    pub max_buffered_pages: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_state: RunState,
}

impl RunSummary {
    pub(crate) fn start(tenant: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            tenant: tenant.into(),
            rounds: 0,
            pages: 0,
            accounts_dispatched: 0,
            accounts_failed: 0,
            tasks_interrupted: 0,
            fallback_fetches: 0,
            max_buffered_pages: 0,
            started_at: now,
            finished_at: now,
            final_state: RunState::Idle,
        }
    }

    /// Whether every dispatched account posted and no worker was interrupted.
    pub fn is_clean(&self) -> bool {
        self.accounts_failed == 0 && self.tasks_interrupted == 0
    }
}
