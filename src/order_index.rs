use smallvec::SmallVec;
use std::collections::{btree_map, BTreeMap};
use std::iter::Rev;
use std::marker::PhantomData;
use std::slice;

use crate::config::Stamp;
use crate::entry::Ranked;
use crate::identity::EntryId;
use crate::order::{cmp_tied, ScoreKey, ScoreOrder, TieBreak};

/// Position of one entity inside its bucket: the stamp it was indexed with
/// and the handle of its canonical record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Tie {
    pub(crate) stamp: Stamp,
    pub(crate) id: EntryId,
}

type Bucket = SmallVec<[Tie; 4]>;

/// Score -> bucket map. Buckets are sorted by `T`, then by key.
///
/// Entities are not stored here; comparisons resolve them through an
/// `entity_of` lookup into the identity arena. Lookups borrow the queried score,
/// so `S` is only cloned when a new bucket is created or a pop hands the score
/// back.
pub(crate) struct OrderIndex<S, O, T> {
    by_score: BTreeMap<ScoreKey<S, O>, Bucket>,
    len: usize,
    _tie: PhantomData<fn() -> T>,
}

impl<S, O, T> Default for OrderIndex<S, O, T> {
    fn default() -> Self {
        Self {
            by_score: BTreeMap::new(),
            len: 0,
            _tie: PhantomData,
        }
    }
}

impl<S, O, T> OrderIndex<S, O, T>
where
    O: ScoreOrder<S>,
{
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn bucket_count(&self) -> usize {
        self.by_score.len()
    }

    pub(crate) fn clear(&mut self) {
        self.by_score.clear();
        self.len = 0;
    }

    #[inline]
    fn search<'a, E, F>(bucket: &[Tie], needle: (&E, Stamp), entity_of: F) -> Result<usize, usize>
    where
        E: Ranked + 'a,
        T: TieBreak<E>,
        F: Fn(EntryId) -> &'a E,
    {
        bucket.binary_search_by(|t| cmp_tied::<E, T>((entity_of(t.id), t.stamp), needle))
    }

    /// Indexes `tie` under `score`; `entity` is the record `tie.id` stands
    /// for. Returns `false` if the exact order key is already present.
    pub(crate) fn insert<'a, E, F>(&mut self, score: S, tie: Tie, entity: &E, entity_of: F) -> bool
    where
        E: Ranked + 'a,
        T: TieBreak<E>,
        F: Fn(EntryId) -> &'a E,
    {
        let bucket = self.by_score.entry(ScoreKey::new(score)).or_default();
        match Self::search(bucket, (entity, tie.stamp), entity_of) {
            Ok(_) => false,
            Err(pos) => {
                bucket.insert(pos, tie);
                self.len += 1;
                true
            }
        }
    }

    /// Drops the entry at the exact order key `(score, entity, stamp)`.
    /// Absent order keys are ignored.
    pub(crate) fn remove<'a, E, F>(
        &mut self,
        score: &S,
        stamp: Stamp,
        entity: &E,
        entity_of: F,
    ) -> bool
    where
        E: Ranked + 'a,
        T: TieBreak<E>,
        F: Fn(EntryId) -> &'a E,
    {
        let score_key = ScoreKey::from_ref(score);
        let Some(bucket) = self.by_score.get_mut(score_key) else {
            return false;
        };
        let Ok(pos) = Self::search(bucket, (entity, stamp), entity_of) else {
            return false;
        };
        bucket.remove(pos);
        self.len -= 1;
        if bucket.is_empty() {
            self.by_score.remove(score_key);
        } else if bucket.spilled() && bucket.len() <= 4 {
            bucket.shrink_to_fit();
        }
        true
    }

    pub(crate) fn bucket(&self, score: &S) -> &[Tie] {
        self.by_score
            .get(ScoreKey::from_ref(score))
            .map(|bucket| bucket.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn first_score(&self) -> Option<&S> {
        self.by_score.first_key_value().map(|(k, _)| &k.score)
    }

    pub(crate) fn last_score(&self) -> Option<&S> {
        self.by_score.last_key_value().map(|(k, _)| &k.score)
    }

    /// First populated score at or after `score` in index order.
    pub(crate) fn ceiling(&self, score: &S) -> Option<&S> {
        self.by_score
            .range(ScoreKey::from_ref(score)..)
            .next()
            .map(|(k, _)| &k.score)
    }

    /// Last populated score at or before `score` in index order.
    pub(crate) fn floor(&self, score: &S) -> Option<&S> {
        self.by_score
            .range(..=ScoreKey::from_ref(score))
            .next_back()
            .map(|(k, _)| &k.score)
    }

    /// 0-based position of an indexed order key.
    pub(crate) fn position<'a, E, F>(
        &self,
        score: &S,
        stamp: Stamp,
        entity: &E,
        entity_of: F,
    ) -> Option<usize>
    where
        E: Ranked + 'a,
        T: TieBreak<E>,
        F: Fn(EntryId) -> &'a E,
    {
        let score_key = ScoreKey::from_ref(score);
        let bucket = self.by_score.get(score_key)?;
        let pos = Self::search(bucket, (entity, stamp), entity_of).ok()?;
        let before: usize = self
            .by_score
            .range(..score_key)
            .map(|(_, bucket)| bucket.len())
            .sum();
        Some(before + pos)
    }

    /// Entry at 0-based position `idx`, walking from whichever end is closer.
    pub(crate) fn select(&self, idx: usize) -> Option<(&S, Tie)> {
        if idx >= self.len {
            return None;
        }
        if idx < self.len / 2 {
            let mut r = idx;
            for (score, bucket) in &self.by_score {
                if r < bucket.len() {
                    return Some((&score.score, bucket[r]));
                }
                r -= bucket.len();
            }
        } else {
            let mut r = self.len - 1 - idx;
            for (score, bucket) in self.by_score.iter().rev() {
                if r < bucket.len() {
                    return Some((&score.score, bucket[bucket.len() - 1 - r]));
                }
                r -= bucket.len();
            }
        }
        None
    }

    /// Removes the first (`front`) or last entry in index order.
    pub(crate) fn pop(&mut self, front: bool) -> Option<Tie> {
        let mut entry = if front {
            self.by_score.first_entry()?
        } else {
            self.by_score.last_entry()?
        };
        let bucket = entry.get_mut();
        let tie = if front {
            bucket.remove(0)
        } else {
            bucket.pop()?
        };
        self.len -= 1;
        if bucket.is_empty() {
            entry.remove();
        } else if bucket.spilled() && bucket.len() <= 4 {
            bucket.shrink_to_fit();
        }
        Some(tie)
    }

    pub(crate) fn iter(&self) -> ScoreIter<'_, S, O> {
        self.iter_window(0, self.len.saturating_sub(1))
    }

    /// Entries at 0-based positions `start..=stop`; both must be in bounds
    /// unless the index is empty.
    pub(crate) fn iter_window(&self, start: usize, stop: usize) -> ScoreIter<'_, S, O> {
        if self.len == 0 || start > stop {
            return ScoreIter::empty(&self.by_score);
        }
        ScoreIter::new(&self.by_score, start, stop, self.len)
    }

    pub(crate) fn buckets(&self) -> impl Iterator<Item = (&S, &[Tie])> + '_ {
        self.by_score
            .iter()
            .map(|(k, bucket)| (&k.score, bucket.as_slice()))
    }
}

/// Double-ended walk over a window of the order index, bucket order outside,
/// tie-break order inside.
pub(crate) struct ScoreIter<'a, S, O> {
    front_outer: btree_map::Iter<'a, ScoreKey<S, O>, Bucket>,
    front_current: Option<(slice::Iter<'a, Tie>, &'a S)>,
    back_outer: Rev<btree_map::Iter<'a, ScoreKey<S, O>, Bucket>>,
    back_current: Option<(Rev<slice::Iter<'a, Tie>>, &'a S)>,
    remaining_front_skip: usize,
    remaining_back_skip: usize,
    yielded_front: usize,
    yielded_back: usize,
    total: usize,
}

impl<'a, S, O> Clone for ScoreIter<'a, S, O> {
    fn clone(&self) -> Self {
        Self {
            front_outer: self.front_outer.clone(),
            front_current: self.front_current.clone(),
            back_outer: self.back_outer.clone(),
            back_current: self.back_current.clone(),
            remaining_front_skip: self.remaining_front_skip,
            remaining_back_skip: self.remaining_back_skip,
            yielded_front: self.yielded_front,
            yielded_back: self.yielded_back,
            total: self.total,
        }
    }
}

impl<'a, S, O> ScoreIter<'a, S, O> {
    fn new(map: &'a BTreeMap<ScoreKey<S, O>, Bucket>, start: usize, stop: usize, len: usize) -> Self {
        Self {
            front_outer: map.iter(),
            front_current: None,
            back_outer: map.iter().rev(),
            back_current: None,
            remaining_front_skip: start,
            remaining_back_skip: len - 1 - stop,
            yielded_front: 0,
            yielded_back: 0,
            total: stop - start + 1,
        }
    }

    fn empty(map: &'a BTreeMap<ScoreKey<S, O>, Bucket>) -> Self {
        Self {
            front_outer: map.iter(),
            front_current: None,
            back_outer: map.iter().rev(),
            back_current: None,
            remaining_front_skip: 0,
            remaining_back_skip: 0,
            yielded_front: 0,
            yielded_back: 0,
            total: 0,
        }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.total - self.yielded_front - self.yielded_back
    }
}

impl<'a, S, O> Iterator for ScoreIter<'a, S, O> {
    type Item = (&'a S, Tie);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }
        loop {
            if let Some((ref mut iter, score)) = self.front_current {
                if self.remaining_front_skip > 0 {
                    let skip = self.remaining_front_skip.min(iter.len());
                    self.remaining_front_skip -= skip;
                    if skip > 0 {
                        iter.nth(skip - 1);
                    }
                }
                if let Some(tie) = iter.next() {
                    self.yielded_front += 1;
                    return Some((score, *tie));
                }
                self.front_current = None;
            }
            let (score, bucket) = self.front_outer.next()?;
            if self.remaining_front_skip >= bucket.len() {
                self.remaining_front_skip -= bucket.len();
                continue;
            }
            self.front_current = Some((bucket.iter(), &score.score));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rem = self.remaining();
        (rem, Some(rem))
    }
}

impl<'a, S, O> DoubleEndedIterator for ScoreIter<'a, S, O> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining() == 0 {
            return None;
        }
        loop {
            if let Some((ref mut iter, score)) = self.back_current {
                if self.remaining_back_skip > 0 {
                    let skip = self.remaining_back_skip.min(iter.len());
                    self.remaining_back_skip -= skip;
                    if skip > 0 {
                        iter.nth(skip - 1);
                    }
                }
                if let Some(tie) = iter.next() {
                    self.yielded_back += 1;
                    return Some((score, *tie));
                }
                self.back_current = None;
            }
            let (score, bucket) = self.back_outer.next()?;
            if self.remaining_back_skip >= bucket.len() {
                self.remaining_back_skip -= bucket.len();
                continue;
            }
            self.back_current = Some((bucket.iter().rev(), &score.score));
        }
    }
}

impl<'a, S, O> ExactSizeIterator for ScoreIter<'a, S, O> {
    fn len(&self) -> usize {
        self.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Scored;
    use crate::order::{Ascending, Descending, EarliestFirst, LatestFirst};
    use std::cell::Cell;
    use std::cmp::Ordering;

    type Row = Scored<&'static str, i32>;

    // Only keys matter inside a bucket; the score lives in the map key.
    static ROWS: [Row; 8] = [
        Scored { key: "a", score: 0 },
        Scored { key: "b", score: 0 },
        Scored { key: "c", score: 0 },
        Scored { key: "d", score: 0 },
        Scored { key: "e", score: 0 },
        Scored { key: "f", score: 0 },
        Scored { key: "g", score: 0 },
        Scored { key: "h", score: 0 },
    ];

    fn row(id: EntryId) -> &'static Row {
        &ROWS[id as usize]
    }

    fn tie(stamp: Stamp, id: EntryId) -> Tie {
        Tie { stamp, id }
    }

    fn build<S, O, T>(entries: &[(S, Stamp, EntryId)]) -> OrderIndex<S, O, T>
    where
        S: Clone,
        O: ScoreOrder<S>,
        T: TieBreak<Row>,
    {
        let mut index = OrderIndex::default();
        for (score, stamp, id) in entries {
            assert!(index.insert(score.clone(), tie(*stamp, *id), row(*id), row));
        }
        index
    }

    fn ids<S, O: ScoreOrder<S>, T>(index: &OrderIndex<S, O, T>) -> Vec<EntryId> {
        index.iter().map(|(_, t)| t.id).collect()
    }

    #[test]
    fn bucket_order_uses_tie_break_then_key() {
        let entries = [(5, 2, 0), (5, 1, 1), (5, 2, 2), (7, 9, 3)];
        let index = build::<i32, Ascending, EarliestFirst>(&entries);
        assert_eq!(ids(&index), [1, 0, 2, 3]);
        let index = build::<i32, Ascending, LatestFirst>(&entries);
        assert_eq!(ids(&index), [0, 2, 1, 3]);
    }

    /// Reverse alphabetical keys, ignoring stamps; the key still settles
    /// exact duplicates.
    struct KeyDesc;

    impl TieBreak<Row> for KeyDesc {
        fn cmp(a: (&Row, Stamp), b: (&Row, Stamp)) -> Ordering {
            b.0.key.cmp(a.0.key)
        }
    }

    #[test]
    fn tie_break_can_read_entity_fields() {
        let index = build::<i32, Ascending, KeyDesc>(&[(5, 1, 0), (5, 2, 3), (5, 3, 1)]);
        assert_eq!(ids(&index), [3, 1, 0]);
    }

    #[test]
    fn exact_duplicate_is_rejected() {
        let mut index = build::<i32, Ascending, EarliestFirst>(&[(1, 1, 0)]);
        assert!(!index.insert(1, tie(1, 0), row(0), row));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_needs_exact_order_key() {
        let mut index = build::<i32, Ascending, EarliestFirst>(&[(1, 1, 0), (1, 2, 1)]);
        assert!(!index.remove(&1, 5, row(0), row));
        assert!(!index.remove(&2, 1, row(0), row));
        assert_eq!(index.len(), 2);
        assert!(index.remove(&1, 1, row(0), row));
        assert_eq!(index.bucket(&1), &[tie(2, 1)]);
        assert!(index.remove(&1, 2, row(1), row));
        assert_eq!(index.bucket_count(), 0);
        assert!(index.bucket(&1).is_empty());
    }

    #[test]
    fn extremes_and_neighbours_ascending() {
        let entries = [(5, 1, 0), (10, 2, 1), (15, 3, 2), (20, 4, 3)];
        let index = build::<i32, Ascending, EarliestFirst>(&entries);
        assert_eq!(index.first_score(), Some(&5));
        assert_eq!(index.last_score(), Some(&20));
        assert_eq!(index.ceiling(&12), Some(&15));
        assert_eq!(index.floor(&12), Some(&10));
        assert_eq!(index.ceiling(&10), Some(&10));
        assert_eq!(index.ceiling(&21), None);
        assert_eq!(index.floor(&4), None);
    }

    #[test]
    fn neighbours_follow_descending_order() {
        let entries = [(5, 1, 0), (10, 2, 1), (15, 3, 2), (20, 4, 3)];
        let index = build::<i32, Descending, EarliestFirst>(&entries);
        assert_eq!(index.first_score(), Some(&20));
        assert_eq!(index.last_score(), Some(&5));
        assert_eq!(index.ceiling(&12), Some(&10));
        assert_eq!(index.floor(&12), Some(&15));
        assert_eq!(index.ceiling(&4), None);
        assert_eq!(index.floor(&21), None);
    }

    #[test]
    fn window_iteration_skips_whole_buckets() {
        let entries = [
            (1, 1, 0),
            (1, 2, 1),
            (1, 3, 2),
            (2, 4, 3),
            (2, 5, 4),
            (3, 6, 5),
            (4, 7, 6),
        ];
        let index = build::<i32, Ascending, EarliestFirst>(&entries);
        let window: Vec<_> = index.iter_window(2, 5).map(|(_, t)| t.id).collect();
        assert_eq!(window, [2, 3, 4, 5]);
        let back: Vec<_> = index.iter_window(2, 5).rev().map(|(_, t)| t.id).collect();
        assert_eq!(back, [5, 4, 3, 2]);

        let mut it = index.iter_window(1, 4);
        assert_eq!(it.len(), 4);
        assert_eq!(it.next().map(|(_, t)| t.id), Some(1));
        assert_eq!(it.next_back().map(|(_, t)| t.id), Some(4));
        assert_eq!(it.len(), 2);
        let rest: Vec<_> = it.map(|(_, t)| t.id).collect();
        assert_eq!(rest, [2, 3]);
    }

    #[test]
    fn select_and_position_agree() {
        let entries = [(3, 1, 0), (1, 2, 1), (1, 3, 2), (2, 4, 3), (9, 5, 4)];
        let index = build::<i32, Descending, EarliestFirst>(&entries);
        for idx in 0..index.len() {
            let (score, t) = index.select(idx).unwrap();
            let score = *score;
            assert_eq!(index.position(&score, t.stamp, row(t.id), row), Some(idx));
        }
        assert!(index.select(index.len()).is_none());
    }

    #[test]
    fn pop_from_both_ends() {
        let entries = [(1, 1, 0), (1, 2, 1), (2, 3, 2)];
        let mut index = build::<i32, Ascending, EarliestFirst>(&entries);
        assert_eq!(index.pop(true), Some(tie(1, 0)));
        assert_eq!(index.pop(false), Some(tie(3, 2)));
        assert_eq!(index.pop(false), Some(tie(2, 1)));
        assert_eq!(index.pop(true), None);
        assert_eq!(index.len(), 0);
        assert_eq!(index.bucket_count(), 0);
    }

    thread_local! {
        static CLONES: Cell<usize> = Cell::new(0);
    }

    /// Score that counts its clones.
    #[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct Tracked(String);

    impl Clone for Tracked {
        fn clone(&self) -> Self {
            CLONES.with(|c| c.set(c.get() + 1));
            Tracked(self.0.clone())
        }
    }

    fn tracked(s: &str) -> Tracked {
        Tracked(s.to_owned())
    }

    #[test]
    fn lookups_borrow_the_score() {
        let mut index: OrderIndex<Tracked, Ascending, EarliestFirst> = OrderIndex::default();
        let entries = [("m", 0), ("m", 1), ("t", 2), ("z", 3)];
        for (stamp, (score, id)) in entries.into_iter().enumerate() {
            assert!(index.insert(tracked(score), tie(stamp as Stamp, id), row(id), row));
        }
        let needle = tracked("p");
        let present = tracked("m");
        let before = CLONES.with(Cell::get);

        assert_eq!(index.bucket(&present).len(), 2);
        assert_eq!(index.ceiling(&needle), Some(&tracked("t")));
        assert_eq!(index.floor(&needle), Some(&tracked("m")));
        assert_eq!(index.position(&present, 1, row(1), row), Some(1));
        assert!(index.remove(&present, 0, row(0), row));
        assert!(index.remove(&present, 1, row(1), row));
        assert_eq!(index.pop(false), Some(tie(3, 3)));

        assert_eq!(CLONES.with(Cell::get), before);
        assert_eq!(index.len(), 1);
    }
}
