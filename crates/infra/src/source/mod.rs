//! Keyset-paged sources of accounts that are due for accrual posting.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use accrual_core::{AccountId, ExecutionContext, Page, SourceError};

pub use in_memory::InMemoryAccountSource;
pub use postgres::PostgresAccountSource;

/// Source of account ids, paged by keyset.
///
/// `fetch_page` returns up to `max_size` ids strictly greater than `after`, in
/// ascending order, and an empty page once exhausted. Implementations must
/// be read-only and safe to call from several worker threads at once.
pub trait AccountSource: Send + Sync {
    fn fetch_page(
        &self,
        ctx: &ExecutionContext,
        after: AccountId,
        max_size: usize,
    ) -> Result<Page, SourceError>;
}

impl<T: AccountSource + ?Sized> AccountSource for Arc<T> {
    fn fetch_page(
        &self,
        ctx: &ExecutionContext,
        after: AccountId,
        max_size: usize,
    ) -> Result<Page, SourceError> {
        (**self).fetch_page(ctx, after, max_size)
    }
}
