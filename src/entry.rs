use std::hash::Hash;

/// Capability set an entity needs to live in a [`RankMap`](crate::RankMap).
///
/// `key` must stay fixed for as long as the entity is in the map. The map
/// decides ordering with its own comparator types, so `Score` only needs to
/// be cloneable here.
pub trait Ranked {
    type Key: Hash + Eq + Ord;
    type Score: Clone;

    fn key(&self) -> &Self::Key;

    fn score(&self) -> &Self::Score;

    /// Independent copy for display or history. Later re-scoring of the
    /// canonical record must not show through the returned value.
    fn snapshot(&self) -> Self
    where
        Self: Sized;
}

/// One row of a ranked snapshot. Ranks are 1-based and unique.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Standing<E> {
    pub rank: usize,
    pub entry: E,
}

/// A minimal `key -> score` entity, handy when the caller has no richer record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scored<K, S> {
    pub key: K,
    pub score: S,
}

impl<K, S> Scored<K, S> {
    pub fn new(key: K, score: S) -> Self {
        Self { key, score }
    }
}

impl<K, S> Ranked for Scored<K, S>
where
    K: Hash + Eq + Ord + Clone,
    S: Clone,
{
    type Key = K;
    type Score = S;

    #[inline]
    fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    fn score(&self) -> &S {
        &self.score
    }

    fn snapshot(&self) -> Self {
        Self {
            key: self.key.clone(),
            score: self.score.clone(),
        }
    }
}
