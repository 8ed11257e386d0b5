//! Round orchestrator for posting accrued interest on savings accounts.
//!
//! A run turns the unbounded account population into a sequence of rounds:
//!
//! 1. take the current page (first one fetched synchronously)
//! 2. split it into at most `thread_pool_size` batches
//! 3. submit one look-ahead fetch task plus one posting task per batch
//! 4. wait for every task of the round (hard barrier)
//! 5. log outcomes, then pop the next page from the look-ahead buffer
//!
//! until the source returns an empty page.

use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, info_span, warn};

use accrual_core::{partition, AccountId, Batch, ContextProvider, ExecutionContext, Page};

use super::buffer::{FetchTask, PrefetchBuffer};
use super::completion::CompletionChecker;
use super::config::{AccrualJobConfig, FailurePolicy};
use super::error::AccrualJobError;
use super::posting_task::{panic_message, PostingTask};
use super::types::{RunState, RunSummary, TaskKind, TaskOutcome, TaskStatus};
use crate::posting::PostingService;
use crate::source::AccountSource;

const JOB: &str = "post_accrual_interest_for_savings";

/// Posts accrued interest for every account the source yields.
///
/// Collaborators are shared with up to `thread_pool_size` worker threads, hence
/// the `Sync` bounds on their traits.
pub struct AccrualPostingJob<S, P, C> {
    source: S,
    poster: P,
    context: C,
}

impl<S, P, C> AccrualPostingJob<S, P, C>
where
    S: AccountSource,
    P: PostingService,
    C: ContextProvider,
{
    pub fn new(source: S, poster: P, context: C) -> Self {
        Self {
            source,
            poster,
            context,
        }
    }

    /// Run to completion with default look-ahead and fail-open reporting.
    pub fn run(&self, thread_pool_size: usize, batch_size: usize) -> Result<RunSummary, AccrualJobError> {
        self.run_with(&AccrualJobConfig::new(thread_pool_size, batch_size))
    }

    /// Run to completion.
    ///
    /// Blocks the calling thread, which must carry the tenant context.
    /// Returns early only on a source failure or a setup problem.
    pub fn run_with(&self, config: &AccrualJobConfig) -> Result<RunSummary, AccrualJobError> {
        config.validate()?;
        let ctx = self.context.capture().ok_or(AccrualJobError::MissingContext)?;
        let page_size = config.page_size();

        let mut run = RunTracker::new(&ctx);
        info!(
            job = JOB,
            tenant = %ctx.tenant_identifier(),
            thread_pool_size = config.thread_pool_size,
            batch_size = config.batch_size,
            page_size,
            lookahead_depth = config.lookahead_depth,
            "starting accrual posting run"
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.thread_pool_size)
            .thread_name(|i| format!("accrual-worker-{i}"))
            .build()
            .map_err(|e| AccrualJobError::WorkerPool(e.to_string()))?;

        run.transition(RunState::Fetching);
        let mut page = self.source.fetch_page(&ctx, AccountId::ZERO, page_size)?;
        let mut buffer = PrefetchBuffer::new(config.lookahead_depth);
        let mut round: u64 = 0;

        while let Some(cursor) = page.last() {
            round += 1;
            run.transition(RunState::Dispatching);

            // Captured once per round; every task gets its own copy.
            let round_ctx = self.context.capture().ok_or(AccrualJobError::MissingContext)?;
            let batches = partition(page.ids(), config.thread_pool_size);
            info!(
                job = JOB,
                tenant = %round_ctx.tenant_identifier(),
                round,
                page_len = page.len(),
                batches = batches.len(),
                buffered = buffer.len(),
                "dispatching round"
            );

            run.summary.pages += 1;
            run.summary.accounts_dispatched += page.len() as u64;
            let fetch = FetchTask::new(round_ctx.clone(), cursor, page_size);

            run.transition(RunState::Awaiting);
            let outcomes = self.dispatch_round(&pool, round, &round_ctx, &batches, fetch, &mut buffer);

            run.transition(RunState::Checking);
            let check = CompletionChecker::check(&round_ctx, &outcomes);
            run.summary.rounds = round;
            run.summary.accounts_failed += check.accounts_failed;
            run.summary.tasks_interrupted += check.tasks_interrupted;
            run.summary.max_buffered_pages = run.summary.max_buffered_pages.max(buffer.high_water());
            if let Some(err) = check.fetch_error {
                return Err(AccrualJobError::Source(err));
            }

            page = match buffer.pop() {
                Some(next) => next,
                None if buffer.is_exhausted() => Page::empty(),
                None => {
                    warn!(
                        tenant = %ctx.tenant_identifier(),
                        round,
                        after = %cursor,
                        "look-ahead buffer empty; fetching next page synchronously"
                    );
                    run.summary.fallback_fetches += 1;
                    self.source.fetch_page(&ctx, cursor, page_size)?
                }
            };
        }

        run.transition(RunState::Drained);
        // Every round cleared its barrier, so no task is left to interrupt.
        drop(pool);

        let summary = run.finish();
        info!(
            job = JOB,
            tenant = %summary.tenant,
            rounds = summary.rounds,
            accounts = summary.accounts_dispatched,
            failed = summary.accounts_failed,
            interrupted = summary.tasks_interrupted,
            "accrual posting run finished"
        );

        match config.failure_policy {
            FailurePolicy::FailAggregate if !summary.is_clean() => {
                Err(AccrualJobError::PostingFailures(Box::new(summary)))
            }
            _ => Ok(summary),
        }
    }

    /// Submit one round and block until every task of it is terminal.
    fn dispatch_round(
        &self,
        pool: &ThreadPool,
        round: u64,
        ctx: &ExecutionContext,
        batches: &[Batch<'_>],
        fetch: FetchTask,
        buffer: &mut PrefetchBuffer,
    ) -> Vec<TaskOutcome> {
        let source = &self.source;
        let poster = &self.poster;
        let provider = &self.context;

        let mut fetch_slot: Option<TaskStatus> = None;
        let mut posting_slots: Vec<Option<TaskStatus>> = batches.iter().map(|_| None).collect();

        pool.scope(|scope| {
            let fetch_slot = &mut fetch_slot;
            scope.spawn(move |_| {
                let span = info_span!("lookahead_fetch", round, tenant = %fetch.context().tenant_identifier());
                let _entered = span.enter();
                *fetch_slot = Some(guarded(|| match fetch.run(source, provider, buffer) {
                    Ok(fetched) => {
                        debug!(fetched, "look-ahead fetch finished");
                        TaskStatus::Done
                    }
                    Err(err) => TaskStatus::FetchFailed(err),
                }));
            });

            for (batch, slot) in batches.iter().zip(posting_slots.iter_mut()) {
                let task = PostingTask::new(*batch, ctx.clone());
                scope.spawn(move |_| {
                    let span = info_span!(
                        "posting_task",
                        round,
                        tenant = %task.context().tenant_identifier(),
                        batch = %task.batch()
                    );
                    let _entered = span.enter();
                    *slot = Some(guarded(|| task.run(poster, provider)));
                });
            }
        });

        let mut outcomes = Vec::with_capacity(batches.len() + 1);
        outcomes.push(TaskOutcome {
            round,
            kind: TaskKind::Fetch,
            status: fetch_slot.unwrap_or_else(unreported),
        });
        for (batch, slot) in batches.iter().zip(posting_slots) {
            let Some(kind) = TaskKind::posting(batch) else {
                continue;
            };
            outcomes.push(TaskOutcome {
                round,
                kind,
                status: slot.unwrap_or_else(unreported),
            });
        }
        outcomes
    }
}

/// State machine bookkeeping for one run.
struct RunTracker {
    state: RunState,
    summary: RunSummary,
}

impl RunTracker {
    fn new(ctx: &ExecutionContext) -> Self {
        Self {
            state: RunState::Idle,
            summary: RunSummary::start(ctx.tenant_identifier()),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run state transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "run state");
        self.state = next;
    }

    fn finish(mut self) -> RunSummary {
        self.summary.final_state = self.state;
        self.summary.finished_at = Utc::now();
        self.summary
    }
}

/// Run a task body, turning a panic that escaped the task into `Interrupted`.
fn guarded<F>(body: F) -> TaskStatus
where
    F: FnOnce() -> TaskStatus,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(status) => status,
        Err(payload) => TaskStatus::Interrupted(panic_message(payload.as_ref())),
    }
}

fn unreported() -> TaskStatus {
    TaskStatus::Interrupted("task did not report a terminal status".to_string())
}
