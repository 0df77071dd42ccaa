//! Comparator strategies.
//!
//! Sort direction and tie-breaking are chosen with zero-sized strategy types so
//! the order index can live in a plain `BTreeMap` without storing a comparator
//! per node.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use crate::config::Stamp;
use crate::entry::Ranked;

/// Orders scores. Rank 1 is the score that sorts first.
pub trait ScoreOrder<S: ?Sized> {
    fn cmp(a: &S, b: &S) -> Ordering;
}

/// Lowest score ranks first.
#[derive(Clone, Copy, Debug, Default)]
pub struct Ascending;

/// Highest score ranks first.
#[derive(Clone, Copy, Debug, Default)]
pub struct Descending;

impl<S: Ord + ?Sized> ScoreOrder<S> for Ascending {
    #[inline]
    fn cmp(a: &S, b: &S) -> Ordering {
        a.cmp(b)
    }
}

impl<S: Ord + ?Sized> ScoreOrder<S> for Descending {
    #[inline]
    fn cmp(a: &S, b: &S) -> Ordering {
        b.cmp(a)
    }
}

/// Orders entities that share a score.
///
/// Each side is the canonical record paired with the stamp it was last
/// upserted with, so implementations may look at entity fields, the stamp,
/// or both. The entity key is always appended as the last discriminator, so
/// two distinct keys never compare equal.
///
/// Whatever the implementation reads must only change through
/// [`RankMap::upsert`](crate::RankMap::upsert); interior mutability behind
/// the map's back leaves entities filed in the wrong position.
pub trait TieBreak<E: ?Sized> {
    fn cmp(a: (&E, Stamp), b: (&E, Stamp)) -> Ordering;
}

/// Earlier updates rank ahead of later ones at equal score.
#[derive(Clone, Copy, Debug, Default)]
pub struct EarliestFirst;

/// Later updates rank ahead of earlier ones at equal score.
#[derive(Clone, Copy, Debug, Default)]
pub struct LatestFirst;

impl<E: ?Sized> TieBreak<E> for EarliestFirst {
    #[inline]
    fn cmp(a: (&E, Stamp), b: (&E, Stamp)) -> Ordering {
        a.1.cmp(&b.1)
    }
}

impl<E: ?Sized> TieBreak<E> for LatestFirst {
    #[inline]
    fn cmp(a: (&E, Stamp), b: (&E, Stamp)) -> Ordering {
        b.1.cmp(&a.1)
    }
}

/// Order of two entities inside one score bucket: `T`, then key.
#[inline]
pub fn cmp_tied<E, T>(a: (&E, Stamp), b: (&E, Stamp)) -> Ordering
where
    E: Ranked,
    T: TieBreak<E>,
{
    T::cmp(a, b).then_with(|| a.0.key().cmp(b.0.key()))
}

/// Full order-key comparison: score, then `T`, then key.
#[inline]
pub fn cmp_order_key<E, O, T>(a: (&E, Stamp), b: (&E, Stamp)) -> Ordering
where
    E: Ranked,
    O: ScoreOrder<E::Score>,
    T: TieBreak<E>,
{
    O::cmp(a.0.score(), b.0.score()).then_with(|| cmp_tied::<E, T>(a, b))
}

/// Score wrapper whose `Ord` follows the strategy `O`.
#[repr(transparent)]
pub(crate) struct ScoreKey<S, O> {
    pub(crate) score: S,
    _order: PhantomData<fn() -> O>,
}

impl<S, O> ScoreKey<S, O> {
    #[inline]
    pub(crate) fn new(score: S) -> Self {
        Self {
            score,
            _order: PhantomData,
        }
    }

    /// Views a borrowed score as a map key, for lookups without a clone.
    #[inline]
    pub(crate) fn from_ref(score: &S) -> &Self {
        // SAFETY: `ScoreKey` is `repr(transparent)` over `S`; the only other
        // field is a zero-sized `PhantomData`.
        unsafe { &*(score as *const S as *const Self) }
    }
}

impl<S: Clone, O> Clone for ScoreKey<S, O> {
    fn clone(&self) -> Self {
        Self::new(self.score.clone())
    }
}

impl<S: fmt::Debug, O> fmt::Debug for ScoreKey<S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.score.fmt(f)
    }
}

impl<S, O: ScoreOrder<S>> PartialEq for ScoreKey<S, O> {
    fn eq(&self, other: &Self) -> bool {
        O::cmp(&self.score, &other.score) == Ordering::Equal
    }
}

impl<S, O: ScoreOrder<S>> Eq for ScoreKey<S, O> {}

impl<S, O: ScoreOrder<S>> PartialOrd for ScoreKey<S, O> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S, O: ScoreOrder<S>> Ord for ScoreKey<S, O> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        O::cmp(&self.score, &other.score)
    }
}
