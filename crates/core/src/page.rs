//! Pages of account ids and their partitioning into batches.

use serde::{Deserialize, Serialize};

use crate::id::AccountId;

/// One keyset page of account ids, ascending.
///
/// An empty page means the source is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Page(Vec<AccountId>);

impl Page {
    pub fn new(ids: Vec<AccountId>) -> Self {
        Self(ids)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn ids(&self) -> &[AccountId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest id of the page; the cursor for the next fetch.
    pub fn last(&self) -> Option<AccountId> {
        self.0.last().copied()
    }
}

impl From<Vec<AccountId>> for Page {
    fn from(ids: Vec<AccountId>) -> Self {
        Self(ids)
    }
}

impl FromIterator<AccountId> for Page {
    fn from_iter<I: IntoIterator<Item = AccountId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Contiguous, non-empty slice of a page handed to one posting task.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Batch<'a> {
    index: usize,
    ids: &'a [AccountId],
}

impl<'a> Batch<'a> {
    /// Position of the batch within its page.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ids(&self) -> &'a [AccountId] {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn first(&self) -> Option<AccountId> {
        self.ids.first().copied()
    }

    pub fn last(&self) -> Option<AccountId> {
        self.ids.last().copied()
    }
}

impl core::fmt::Display for Batch<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => write!(f, "batch#{}[{}..={}]", self.index, first, last),
            _ => write!(f, "batch#{}[]", self.index),
        }
    }
}

/// Split `ids` into at most `batch_count` near-equal batches.
///
/// Target size is `ceil(len / batch_count)`. A boundary that would separate two
/// equal neighbours is pushed right until it no longer does, so the same
/// account can never end up in two batches. The last batch absorbs whatever
/// remains. Empty batches are never produced.
pub fn partition(ids: &[AccountId], batch_count: usize) -> Vec<Batch<'_>> {
    let len = ids.len();
    if len == 0 {
        return Vec::new();
    }

    let target = len.div_ceil(batch_count.max(1));
    let mut batches = Vec::with_capacity(batch_count.max(1).min(len));
    let mut from = 0;

    while from < len {
        let mut to = (from + target).min(len);
        while to < len && ids[to - 1] == ids[to] {
            to += 1;
        }
        batches.push(Batch {
            index: batches.len(),
            ids: &ids[from..to],
        });
        from = to;
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(raw: &[i64]) -> Vec<AccountId> {
        raw.iter().copied().map(AccountId::new).collect()
    }

    fn raw(batch: &Batch<'_>) -> Vec<i64> {
        batch.ids().iter().map(|id| id.get()).collect()
    }

    #[test]
    fn splits_page_into_even_batches() {
        let page = ids(&[1, 2, 3, 4]);
        let batches = partition(&page, 2);

        assert_eq!(batches.len(), 2);
        assert_eq!(raw(&batches[0]), vec![1, 2]);
        assert_eq!(raw(&batches[1]), vec![3, 4]);
    }

    #[test]
    fn single_id_page_yields_one_batch() {
        let page = ids(&[5]);
        let batches = partition(&page, 2);

        assert_eq!(batches.len(), 1);
        assert_eq!(raw(&batches[0]), vec![5]);
    }

    #[test]
    fn boundary_extends_past_duplicate_ids() {
        let page = ids(&[10, 10, 11, 12]);
        let batches = partition(&page, 2);

        assert_eq!(batches.len(), 2);
        assert_eq!(raw(&batches[0]), vec![10, 10]);
        assert_eq!(raw(&batches[1]), vec![11, 12]);
    }

    #[test]
    fn duplicate_straddling_nominal_boundary_stays_together() {
        let page = ids(&[1, 2, 2, 2, 3, 4]);
        let batches = partition(&page, 3);

        assert_eq!(raw(&batches[0]), vec![1, 2, 2, 2]);
        assert_eq!(raw(&batches[1]), vec![3, 4]);
        assert_eq!(batches.len(), 2);
    }

    #[test]
    fn fewer_ids_than_batches_drops_empty_batches() {
        let page = ids(&[1, 2]);
        let batches = partition(&page, 8);

        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| !b.is_empty()));
    }

    #[test]
    fn empty_page_yields_no_batches() {
        assert!(partition(&[], 4).is_empty());
    }

    #[test]
    fn zero_batch_count_is_treated_as_one() {
        let page = ids(&[1, 2, 3]);
        let batches = partition(&page, 0);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[test]
    fn batch_display_shows_range() {
        let page = ids(&[3, 4, 9]);
        let batches = partition(&page, 1);
        assert_eq!(batches[0].to_string(), "batch#0[3..=9]");
    }

    fn sorted_ids() -> impl Strategy<Value = Vec<AccountId>> {
        prop::collection::vec(0i64..64, 0..256).prop_map(|mut v| {
            v.sort_unstable();
            v.into_iter().map(AccountId::new).collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: batches concatenate back to the page, exactly.
        #[test]
        fn batches_reassemble_the_page(page in sorted_ids(), k in 1usize..16) {
            let batches = partition(&page, k);
            let rebuilt: Vec<AccountId> = batches.iter().flat_map(|b| b.ids().iter().copied()).collect();
            prop_assert_eq!(rebuilt, page);
        }

        /// Property: never more than `k` batches and never an empty one.
        #[test]
        fn batch_count_is_bounded(page in sorted_ids(), k in 1usize..16) {
            let batches = partition(&page, k);
            prop_assert!(batches.len() <= k);
            prop_assert!(batches.iter().all(|b| !b.is_empty()));
            for (i, b) in batches.iter().enumerate() {
                prop_assert_eq!(b.index(), i);
            }
        }

        /// Property: equal neighbours are never split across two batches.
        #[test]
        fn equal_ids_share_a_batch(page in sorted_ids(), k in 1usize..16) {
            let batches = partition(&page, k);
            for pair in batches.windows(2) {
                prop_assert_ne!(pair[0].last(), pair[1].first());
            }
        }
    }
}
