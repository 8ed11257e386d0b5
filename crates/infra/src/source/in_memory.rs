use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use accrual_core::{AccountId, ExecutionContext, Page, SourceError};

use super::AccountSource;

/// In-memory account source.
///
/// Intended for tests/dev. Ids are kept sorted so a page is a binary search
/// plus a slice copy.
#[derive(Debug, Default)]
pub struct InMemoryAccountSource {
    accounts: RwLock<Vec<AccountId>>,
    fetches: AtomicUsize,
}

impl InMemoryAccountSource {
    pub fn new(accounts: impl IntoIterator<Item = AccountId>) -> Self {
        let mut accounts: Vec<AccountId> = accounts.into_iter().collect();
        accounts.sort();
        Self {
            accounts: RwLock::new(accounts),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Source holding ids `1..=count`.
    pub fn sequential(count: i64) -> Self {
        Self::new((1..=count).map(AccountId::new))
    }

    /// Add an account; later pages pick it up if it sorts after the cursor.
    pub fn insert(&self, id: AccountId) {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let at = accounts.partition_point(|existing| *existing <= id);
        accounts.insert(at, id);
    }

    /// Number of `fetch_page` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl AccountSource for InMemoryAccountSource {
    fn fetch_page(
        &self,
        _ctx: &ExecutionContext,
        after: AccountId,
        max_size: usize,
    ) -> Result<Page, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        let start = accounts.partition_point(|id| *id <= after);
        let end = start.saturating_add(max_size).min(accounts.len());
        Ok(Page::new(accounts[start..end].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrual_core::TenantId;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            TenantId::new(),
            "default",
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        )
    }

    fn raw(page: &Page) -> Vec<i64> {
        page.ids().iter().map(|id| id.get()).collect()
    }

    #[test]
    fn pages_are_keyset_bounded() {
        let source = InMemoryAccountSource::sequential(5);
        let ctx = ctx();

        let first = source.fetch_page(&ctx, AccountId::ZERO, 4).unwrap();
        assert_eq!(raw(&first), vec![1, 2, 3, 4]);

        let second = source.fetch_page(&ctx, first.last().unwrap(), 4).unwrap();
        assert_eq!(raw(&second), vec![5]);

        let third = source.fetch_page(&ctx, second.last().unwrap(), 4).unwrap();
        assert!(third.is_empty());
        assert_eq!(source.fetch_count(), 3);
    }

    #[test]
    fn inserts_behind_the_cursor_are_not_revisited() {
        let source = InMemoryAccountSource::new([2, 4, 6].map(AccountId::new));
        let ctx = ctx();

        let first = source.fetch_page(&ctx, AccountId::ZERO, 2).unwrap();
        assert_eq!(raw(&first), vec![2, 4]);

        source.insert(AccountId::new(3));
        source.insert(AccountId::new(5));

        let second = source.fetch_page(&ctx, first.last().unwrap(), 2).unwrap();
        assert_eq!(raw(&second), vec![5, 6]);
    }

    proptest! {
        /// Property: paging with the monotonic cursor visits every id once, ascending.
        #[test]
        fn keyset_paging_visits_every_id_once(
            ids in prop::collection::btree_set(1i64..10_000, 0..300),
            page_size in 1usize..40,
        ) {
            let expected: Vec<i64> = ids.into_iter().collect();
            let source = InMemoryAccountSource::new(expected.iter().copied().map(AccountId::new));
            let ctx = ctx();

            let mut seen = Vec::new();
            let mut cursor = AccountId::ZERO;
            loop {
                let page = source.fetch_page(&ctx, cursor, page_size).unwrap();
                let Some(last) = page.last() else { break };
                prop_assert!(last > cursor);
                seen.extend(raw(&page));
                cursor = last;
            }

            prop_assert_eq!(seen, expected);
        }
    }
}
