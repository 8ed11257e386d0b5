//! Posting of accrued interest for one account.
//!
//! The accrual computation itself lives behind `PostingService`; the job only
//! decides which accounts to post and on which thread.

pub mod postgres;

use std::sync::Arc;

use accrual_core::{AccountId, ExecutionContext, PostingResult};

pub use postgres::PostgresPostingService;

/// Posts accrued interest for a single account.
///
/// A failure must only concern `account`; implementations are invoked from
/// several worker threads at once.
pub trait PostingService: Send + Sync {
    fn post(&self, ctx: &ExecutionContext, account: AccountId) -> PostingResult<()>;
}

impl<T: PostingService + ?Sized> PostingService for Arc<T> {
    fn post(&self, ctx: &ExecutionContext, account: AccountId) -> PostingResult<()> {
        (**self).post(ctx, account)
    }
}
