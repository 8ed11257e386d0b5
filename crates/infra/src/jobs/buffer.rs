//! Look-ahead page buffer and the fetch task that refills it.

use std::collections::VecDeque;

use tracing::debug;

use accrual_core::{AccountId, ContextProvider, ExecutionContext, Page, SourceError};

use super::context::ContextGuard;
use crate::source::AccountSource;

/// Bounded FIFO of pages fetched ahead of the page being posted.
///
/// Owned by the orchestrator. The fetch task only reaches it through a
/// `&mut` borrow that lives inside one round's scope, so the buffer and the
/// cursor are never touched by two threads at once.
#[derive(Debug)]
pub struct PrefetchBuffer {
    pages: VecDeque<Page>,
    capacity: usize,
    exhausted: bool,
    high_water: usize,
}

impl PrefetchBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pages: VecDeque::with_capacity(capacity),
            capacity,
            exhausted: false,
            high_water: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pages.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The source returned an empty page; nothing past the last buffered page exists.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    /// Most pages ever held at once.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Highest id buffered so far.
    pub fn last_cursor(&self) -> Option<AccountId> {
        self.pages.back().and_then(Page::last)
    }

    /// Append a non-empty page. Returns the page back when the buffer is full.
    pub fn push(&mut self, page: Page) -> Result<(), Page> {
        if self.is_full() || page.is_empty() {
            return Err(page);
        }
        self.pages.push_back(page);
        self.high_water = self.high_water.max(self.pages.len());
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Page> {
        self.pages.pop_front()
    }
}

/// Look-ahead fetch, run as one task of a round.
#[derive(Debug)]
pub struct FetchTask {
    ctx: ExecutionContext,
    cursor: AccountId,
    page_size: usize,
}

impl FetchTask {
    /// `cursor` is the last id of the page being posted in the same round.
    pub fn new(ctx: ExecutionContext, cursor: AccountId, page_size: usize) -> Self {
        Self {
            ctx,
            cursor,
            page_size,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Fill `buffer` up to capacity or until the source is exhausted.
    ///
    /// Returns the number of pages appended.
    pub fn run<S, C>(self, source: &S, provider: &C, buffer: &mut PrefetchBuffer) -> Result<usize, SourceError>
    where
        S: AccountSource + ?Sized,
        C: ContextProvider + ?Sized,
    {
        let _attached = ContextGuard::attach(provider, &self.ctx);

        let mut cursor = buffer
            .last_cursor()
            .map_or(self.cursor, |buffered| buffered.max(self.cursor));
        let mut fetched = 0;

        while !buffer.is_full() && !buffer.is_exhausted() {
            let page = source.fetch_page(&self.ctx, cursor, self.page_size)?;
            let Some(last) = page.last() else {
                debug!(after = %cursor, "account source exhausted");
                buffer.mark_exhausted();
                break;
            };

            debug!(after = %cursor, len = page.len(), "buffered look-ahead page");
            cursor = last;
            if buffer.push(page).is_err() {
                break;
            }
            fetched += 1;
        }

        Ok(fetched)
    }
}
