use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use accrual_core::{Batch, ContextProvider, ExecutionContext, PostingError};

use super::context::ContextGuard;
use super::types::{AccountFailure, TaskStatus};
use crate::posting::PostingService;

/// Posts every account of one batch under the round's execution context.
#[derive(Debug)]
pub struct PostingTask<'a> {
    batch: Batch<'a>,
    ctx: ExecutionContext,
}

impl<'a> PostingTask<'a> {
    pub fn new(batch: Batch<'a>, ctx: ExecutionContext) -> Self {
        Self { batch, ctx }
    }

    pub fn batch(&self) -> &Batch<'a> {
        &self.batch
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Attempt every account in the batch, each exactly once.
    ///
    /// A failed account never short-circuits the rest of the batch, and a
    /// panic inside the service counts as that account's failure.
    pub fn run<P, C>(self, service: &P, provider: &C) -> TaskStatus
    where
        P: PostingService + ?Sized,
        C: ContextProvider + ?Sized,
    {
        let _attached = ContextGuard::attach(provider, &self.ctx);

        let mut failures = Vec::new();
        let mut previous = None;
        for &account in self.batch.ids() {
            // Equal ids are adjacent (the page is sorted); post them once.
            if previous == Some(account) {
                continue;
            }
            previous = Some(account);

            let posted = panic::catch_unwind(AssertUnwindSafe(|| service.post(&self.ctx, account)))
                .unwrap_or_else(|payload| {
                    Err(PostingError::invariant(format!(
                        "posting panicked: {}",
                        panic_message(payload.as_ref())
                    )))
                });
            if let Err(error) = posted {
                failures.push(AccountFailure { account, error });
            }
        }

        if failures.is_empty() {
            TaskStatus::Done
        } else {
            TaskStatus::Failed(failures)
        }
    }
}

pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use accrual_core::{
        partition, AccountId, PostingError, PostingResult, TenantId, ThreadLocalContextProvider,
    };
    use chrono::NaiveDate;

    #[derive(Default)]
    struct RecordingService {
        posted: Mutex<Vec<(AccountId, Option<ExecutionContext>)>>,
        failing: Vec<AccountId>,
        panicking: Vec<AccountId>,
    }

    impl PostingService for RecordingService {
        fn post(&self, _ctx: &ExecutionContext, account: AccountId) -> PostingResult<()> {
            self.posted
                .lock()
                .unwrap()
                .push((account, ThreadLocalContextProvider::current()));
            if self.panicking.contains(&account) {
                panic!("rate chart lookup overflowed for {account}");
            }
            if self.failing.contains(&account) {
                return Err(PostingError::validation("interest rate chart missing"));
            }
            Ok(())
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            TenantId::new(),
            "default",
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        )
    }

    fn ids(raw: &[i64]) -> Vec<AccountId> {
        raw.iter().copied().map(AccountId::new).collect()
    }

    #[test]
    fn failure_does_not_skip_siblings() {
        let page = ids(&[3, 4]);
        let batches = partition(&page, 1);
        let service = RecordingService {
            failing: ids(&[3]),
            ..Default::default()
        };

        let status = PostingTask::new(batches[0], ctx()).run(&service, &ThreadLocalContextProvider);

        let posted: Vec<AccountId> = service.posted.lock().unwrap().iter().map(|(a, _)| *a).collect();
        assert_eq!(posted, ids(&[3, 4]));
        match status {
            TaskStatus::Failed(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].account, AccountId::new(3));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn panic_on_first_account_is_recorded_and_siblings_still_post() {
        let page = ids(&[1, 2, 3]);
        let batches = partition(&page, 1);
        let service = RecordingService {
            panicking: ids(&[1]),
            ..Default::default()
        };
        let ctx = ctx();

        let status = PostingTask::new(batches[0], ctx.clone()).run(&service, &ThreadLocalContextProvider);

        let posted = service.posted.lock().unwrap().clone();
        assert_eq!(posted.iter().map(|(a, _)| *a).collect::<Vec<_>>(), ids(&[1, 2, 3]));
        // The context survives the caught panic for the remaining accounts.
        assert!(posted.iter().all(|(_, seen)| seen.as_ref() == Some(&ctx)));
        match status {
            TaskStatus::Failed(failures) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].account, AccountId::new(1));
                assert!(matches!(
                    &failures[0].error,
                    PostingError::InvariantViolation(msg) if msg.contains("rate chart lookup overflowed")
                ));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(ThreadLocalContextProvider::current(), None);
    }

    #[test]
    fn duplicate_ids_are_posted_once() {
        let page = ids(&[10, 10, 11]);
        let batches = partition(&page, 1);
        let service = RecordingService::default();

        let status = PostingTask::new(batches[0], ctx()).run(&service, &ThreadLocalContextProvider);

        assert!(status.is_success());
        let posted: Vec<AccountId> = service.posted.lock().unwrap().iter().map(|(a, _)| *a).collect();
        assert_eq!(posted, ids(&[10, 11]));
    }

    #[test]
    fn context_is_attached_while_posting_and_detached_after() {
        let page = ids(&[1, 2]);
        let batches = partition(&page, 1);
        let service = RecordingService::default();
        let ctx = ctx();

        PostingTask::new(batches[0], ctx.clone()).run(&service, &ThreadLocalContextProvider);

        for (_, seen) in service.posted.lock().unwrap().iter() {
            assert_eq!(seen.as_ref(), Some(&ctx));
        }
        assert_eq!(ThreadLocalContextProvider::current(), None);
    }
}
