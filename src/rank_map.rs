use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FusedIterator;

use tracing::{debug, trace};

use crate::config::{RankConfig, Stamp, StampClock, StampSource};
use crate::entry::{Ranked, Standing};
use crate::error::{RankError, Result};
use crate::identity::{DefaultBuild, EntryId, IdentityIndex};
use crate::order::{cmp_order_key, Descending, EarliestFirst, ScoreOrder, TieBreak};
use crate::order_index::{OrderIndex, ScoreIter, Tie};

/// Keyed entities kept in rank order.
///
/// Every entity lives once, in the identity index. The order index keeps
/// `(score, stamp, key)` positions that point back at it. Both are only ever
/// changed together through [`upsert`](Self::upsert),
/// [`remove`](Self::remove), the pops and [`clear`](Self::clear).
///
/// * `O` orders scores; rank 1 is the score that sorts first. The default,
///   [`Descending`], gives "highest score wins".
/// * `T` orders entities sharing a score, by update stamp or by entity
///   fields; the key always settles what is left.
/// * `H` hashes keys for the identity index.
///
/// There is no internal locking. Share it behind one lock per mutation, or
/// hand readers a [`snapshot_ranked`](Self::snapshot_ranked).
pub struct RankMap<E, O = Descending, T = EarliestFirst, H = DefaultBuild>
where
    E: Ranked,
{
    identity: IdentityIndex<E, H>,
    order: OrderIndex<E::Score, O, T>,
    clock: StampClock,
}

#[inline]
fn entities<'a, E, H>(identity: &'a IdentityIndex<E, H>) -> impl Fn(EntryId) -> &'a E + 'a {
    move |id| &identity.slot(id).entity
}

impl<E, O, T, H> RankMap<E, O, T, H>
where
    E: Ranked,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
    H: BuildHasher + Default,
{
    pub fn new() -> Self {
        Self::with_config_and_hasher(RankConfig::default(), H::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config_and_hasher(RankConfig::new().capacity(capacity), H::default())
    }

    pub fn with_config(config: RankConfig) -> Self {
        Self::with_config_and_hasher(config, H::default())
    }
}

impl<E, O, T, H> Default for RankMap<E, O, T, H>
where
    E: Ranked,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
    H: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E, O, T, H> RankMap<E, O, T, H>
where
    E: Ranked,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
    H: BuildHasher,
{
    pub fn with_hasher(hasher: H) -> Self {
        Self::with_config_and_hasher(RankConfig::default(), hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
        Self::with_config_and_hasher(RankConfig::new().capacity(capacity), hasher)
    }

    pub fn with_config_and_hasher(config: RankConfig, hasher: H) -> Self {
        Self {
            identity: IdentityIndex::with_capacity_and_hasher(config.capacity, hasher),
            order: OrderIndex::default(),
            clock: StampClock::new(config.stamp_source),
        }
    }

    pub fn hasher(&self) -> &H {
        self.identity.hasher()
    }

    pub fn stamp_source(&self) -> StampSource {
        self.clock.source()
    }

    /// Inserts `entity`, or re-scores the entity already stored under its key.
    ///
    /// Every call takes a fresh stamp, including a re-score to the same score,
    /// so under [`EarliestFirst`] the entity moves behind others that were
    /// updated earlier. Returns the record that was replaced.
    pub fn upsert(&mut self, entity: E) -> Option<E> {
        let stamp = self.clock.next();
        match self.identity.lookup(entity.key()) {
            None => {
                let score = entity.score().clone();
                let id = self.identity.insert(entity, stamp);
                let identity = &self.identity;
                let stored = &identity.slot(id).entity;
                let inserted = self
                    .order
                    .insert(score, Tie { stamp, id }, stored, entities(identity));
                debug_assert!(inserted, "fresh order key already indexed");
                trace!(stamp, len = self.len(), "inserted entry");
                None
            }
            Some(id) => {
                let identity = &self.identity;
                let old = identity.slot(id);
                let removed = self.order.remove(
                    old.entity.score(),
                    old.stamp,
                    &old.entity,
                    entities(identity),
                );
                debug_assert!(removed, "stored order key missing from order index");
                // `id` still resolves to the old record here, but the old
                // position is gone, so no comparison reaches it.
                let inserted = self.order.insert(
                    entity.score().clone(),
                    Tie { stamp, id },
                    &entity,
                    entities(identity),
                );
                debug_assert!(inserted, "fresh order key already indexed");
                let previous = self.identity.replace(id, entity, stamp);
                trace!(stamp, len = self.len(), "re-scored entry");
                Some(previous)
            }
        }
    }

    /// Removes the entity stored under `key`. The order position is taken
    /// from the stored record, never from a caller's copy.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<E>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = self.identity.lookup(key)?;
        let identity = &self.identity;
        let slot = identity.slot(id);
        let removed = self.order.remove(
            slot.entity.score(),
            slot.stamp,
            &slot.entity,
            entities(identity),
        );
        debug_assert!(removed, "stored order key missing from order index");
        let slot = self.identity.remove(id);
        trace!(len = self.len(), "removed entry");
        Some(slot.entity)
    }

    /// Removes and returns the rank 1 entity.
    pub fn pop_first(&mut self) -> Option<E> {
        self.pop(true)
    }

    /// Removes and returns the last ranked entity.
    pub fn pop_last(&mut self) -> Option<E> {
        self.pop(false)
    }

    fn pop(&mut self, front: bool) -> Option<E> {
        let tie = self.order.pop(front)?;
        let slot = self.identity.remove(tie.id);
        debug!(front, len = self.len(), "popped entry");
        Some(slot.entity)
    }

    pub fn clear(&mut self) {
        let dropped = self.len();
        self.order.clear();
        self.identity.clear();
        debug!(dropped, "cleared rank map");
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.identity.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct populated scores.
    pub fn score_count(&self) -> usize {
        self.order.bucket_count()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.identity.lookup(key).is_some()
    }

    /// Canonical record stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&E>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.identity.get(key).map(|slot| &slot.entity)
    }

    /// Stamp the entity under `key` was last upserted with.
    pub fn stamp_of<Q>(&self, key: &Q) -> Option<Stamp>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.identity.get(key).map(|slot| slot.stamp)
    }

    /// Display copy of the entity under `key`, detached from later updates.
    pub fn copy_for_display<Q>(&self, key: &Q) -> Option<E>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).map(Ranked::snapshot)
    }

    /// 1-based rank of the entity under `key`.
    pub fn rank_of<Q>(&self, key: &Q) -> Option<usize>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.identity.get(key)?;
        self.order
            .position(
                slot.entity.score(),
                slot.stamp,
                &slot.entity,
                entities(&self.identity),
            )
            .map(|pos| pos + 1)
    }

    /// Entity holding the 1-based `rank`.
    pub fn select(&self, rank: usize) -> Option<&E> {
        let idx = rank.checked_sub(1)?;
        let (_, tie) = self.order.select(idx)?;
        Some(&self.identity.slot(tie.id).entity)
    }

    /// All entities sharing `score`, in tie-break order. Empty if none.
    pub fn bucket(
        &self,
        score: &E::Score,
    ) -> impl DoubleEndedIterator<Item = &E> + ExactSizeIterator + '_ {
        let identity = &self.identity;
        self.order
            .bucket(score)
            .iter()
            .map(move |tie| &identity.slot(tie.id).entity)
    }

    pub fn first_score(&self) -> Option<&E::Score> {
        self.order.first_score()
    }

    pub fn last_score(&self) -> Option<&E::Score> {
        self.order.last_score()
    }

    /// First populated score at or after `score` in rank order.
    ///
    /// With [`Descending`] this is the highest score that is `<= score`.
    pub fn ceiling_score(&self, score: &E::Score) -> Option<&E::Score> {
        self.order.ceiling(score)
    }

    /// Last populated score at or before `score` in rank order.
    ///
    /// With [`Descending`] this is the lowest score that is `>= score`.
    pub fn floor_score(&self, score: &E::Score) -> Option<&E::Score> {
        self.order.floor(score)
    }

    /// Every entity in rank order. The iterator borrows the map, so it can be
    /// restarted by calling `iter` again or cloned mid-walk.
    pub fn iter(&self) -> Iter<'_, E, O, H> {
        Iter {
            inner: self.order.iter(),
            identity: &self.identity,
        }
    }

    /// Entities at 0-based rank positions `start..=stop`. Negative indices
    /// count from the end, `-1` being the last entity; out of range bounds
    /// are clamped.
    pub fn range(&self, start: isize, stop: isize) -> Iter<'_, E, O, H> {
        let len = self.len() as isize;
        let empty = Iter {
            inner: self.order.iter_window(1, 0),
            identity: &self.identity,
        };
        if len == 0 {
            return empty;
        }
        let start = (if start < 0 { len + start } else { start }).max(0);
        let stop = if stop < 0 { len + stop } else { stop };
        if stop < 0 || start >= len {
            return empty;
        }
        let stop = stop.min(len - 1);
        Iter {
            inner: self.order.iter_window(start as usize, stop as usize),
            identity: &self.identity,
        }
    }

    /// Display copies of every entity, paired with ranks `1..=len`.
    ///
    /// Equal scores get consecutive ranks in tie-break order. The result owns
    /// its data, so it stays valid while the map keeps changing.
    pub fn snapshot_ranked(&self) -> Vec<Standing<E>> {
        self.snapshot_ranked_with(|rank, entity| Standing {
            rank,
            entry: entity.snapshot(),
        })
    }

    /// Walks the map once in rank order and maps each `(rank, entity)` through
    /// `f`. Ranks start at 1.
    pub fn snapshot_ranked_with<F, R>(&self, mut f: F) -> Vec<R>
    where
        F: FnMut(usize, &E) -> R,
    {
        let mut out = Vec::with_capacity(self.len());
        for (idx, entity) in self.iter().enumerate() {
            out.push(f(idx + 1, entity));
        }
        debug!(len = out.len(), "took ranked snapshot");
        out
    }

    /// Cross-checks both indexes.
    ///
    /// Any error here means a comparator broke its contract, e.g. `O`
    /// disagreeing with itself between calls.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(RankError::Inconsistent(msg));
        if self.identity.len() != self.order.len() {
            return fail(format!(
                "identity holds {} entries, order index holds {}",
                self.identity.len(),
                self.order.len()
            ));
        }
        let mut prev: Option<(&E, Stamp, EntryId)> = None;
        for (score, tie) in self.order.iter() {
            let Some(slot) = self.identity.try_slot(tie.id) else {
                return fail(format!("order index points at freed entry {}", tie.id));
            };
            if O::cmp(slot.entity.score(), score) != Ordering::Equal {
                return fail(format!("entry {} is bucketed under a stale score", tie.id));
            }
            if slot.stamp != tie.stamp {
                return fail(format!(
                    "entry {} indexed with stamp {}, record has {}",
                    tie.id, tie.stamp, slot.stamp
                ));
            }
            if self.identity.lookup(slot.entity.key()) != Some(tie.id) {
                return fail(format!("entry {} is not reachable by its key", tie.id));
            }
            if let Some((prev_entity, prev_stamp, prev_id)) = prev {
                let ord = cmp_order_key::<E, O, T>(
                    (prev_entity, prev_stamp),
                    (&slot.entity, tie.stamp),
                );
                if ord != Ordering::Less {
                    return fail(format!("entries {prev_id} and {} are out of order", tie.id));
                }
            }
            prev = Some((&slot.entity, tie.stamp, tie.id));
        }
        if self.identity.iter().count() != self.identity.len() {
            return fail("identity arena and key table disagree".to_owned());
        }
        Ok(())
    }
}

/// Bulk load. Later duplicates of a key win, exactly as repeated
/// [`upsert`](RankMap::upsert) calls would.
impl<E, O, T, H> Extend<E> for RankMap<E, O, T, H>
where
    E: Ranked,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
    H: BuildHasher,
{
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        let before = self.len();
        let mut seen = 0usize;
        for entity in iter {
            self.upsert(entity);
            seen += 1;
        }
        debug!(seen, added = self.len() - before, "bulk loaded entries");
    }
}

impl<E, O, T, H> FromIterator<E> for RankMap<E, O, T, H>
where
    E: Ranked,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
    H: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, E, O, T, H> IntoIterator for &'a RankMap<E, O, T, H>
where
    E: Ranked,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
    H: BuildHasher,
{
    type Item = &'a E;
    type IntoIter = Iter<'a, E, O, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Renders as `{score: [entities...], ...}` in rank order.
impl<E, O, T, H> fmt::Debug for RankMap<E, O, T, H>
where
    E: Ranked + fmt::Debug,
    E::Score: fmt::Debug,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = &self.identity;
        f.debug_map()
            .entries(self.order.buckets().map(|(score, ties)| {
                let members: Vec<&E> = ties.iter().map(|t| &identity.slot(t.id).entity).collect();
                (score, members)
            }))
            .finish()
    }
}

/// Rank-order iterator returned by [`RankMap::iter`] and [`RankMap::range`].
pub struct Iter<'a, E: Ranked, O, H> {
    inner: ScoreIter<'a, E::Score, O>,
    identity: &'a IdentityIndex<E, H>,
}

impl<'a, E: Ranked, O, H> Clone for Iter<'a, E, O, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            identity: self.identity,
        }
    }
}

impl<'a, E: Ranked, O, H> Iterator for Iter<'a, E, O, H> {
    type Item = &'a E;

    #[inline]
    fn next(&mut self) -> Option<&'a E> {
        let (_, tie) = self.inner.next()?;
        Some(&self.identity.slot(tie.id).entity)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, E: Ranked, O, H> DoubleEndedIterator for Iter<'a, E, O, H> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a E> {
        let (_, tie) = self.inner.next_back()?;
        Some(&self.identity.slot(tie.id).entity)
    }
}

impl<'a, E: Ranked, O, H> ExactSizeIterator for Iter<'a, E, O, H> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<'a, E: Ranked, O, H> FusedIterator for Iter<'a, E, O, H> {}
