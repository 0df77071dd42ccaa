use hashbrown::raw::RawTable;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use crate::config::Stamp;
use crate::entry::Ranked;

#[cfg(feature = "fast-hash")]
use rustc_hash::FxHasher;
#[cfg(feature = "fast-hash")]
use std::hash::BuildHasherDefault;

#[cfg(not(feature = "fast-hash"))]
use ahash::RandomState;

#[cfg(feature = "fast-hash")]
pub type DefaultBuild = BuildHasherDefault<FxHasher>;
#[cfg(not(feature = "fast-hash"))]
pub type DefaultBuild = RandomState;

/// Handle the order index uses to refer back to a canonical record.
pub type EntryId = u32;

/// Canonical record plus the stamp it was last indexed under.
#[derive(Clone, Debug)]
pub(crate) struct Slot<E> {
    pub(crate) entity: E,
    pub(crate) stamp: Stamp,
}

// Entry we store in RawTable. Keys live in the slot arena only.
struct KeyEntry {
    hash: u64,
    id: EntryId,
}

/// Key -> record map. Records sit in an arena of slots addressed by
/// [`EntryId`]; freed ids are recycled.
pub(crate) struct IdentityIndex<E, H = DefaultBuild> {
    hasher: H,
    table: RawTable<KeyEntry>,
    // id -> record (None when freed)
    slots: Vec<Option<Slot<E>>>,
    free_ids: Vec<EntryId>,
}

impl<E, H: Default> Default for IdentityIndex<E, H> {
    fn default() -> Self {
        Self::with_capacity_and_hasher(0, H::default())
    }
}

impl<E, H> fmt::Debug for IdentityIndex<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityIndex")
            .field("len", &self.table.len())
            .field("allocated_ids", &self.slots.len())
            .field("free_ids", &self.free_ids.len())
            .finish()
    }
}

impl<E, H> IdentityIndex<E, H> {
    pub(crate) fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
        Self {
            hasher,
            table: RawTable::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free_ids: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    #[cfg(test)]
    pub(crate) fn allocated_ids(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn hasher(&self) -> &H {
        &self.hasher
    }

    #[inline]
    pub(crate) fn try_slot(&self, id: EntryId) -> Option<&Slot<E>> {
        self.slots.get(id as usize).and_then(|slot| slot.as_ref())
    }

    #[inline]
    pub(crate) fn slot(&self, id: EntryId) -> &Slot<E> {
        self.try_slot(id).expect("invalid entry id")
    }

    pub(crate) fn clear(&mut self) {
        self.table.clear();
        self.slots.clear();
        self.free_ids.clear();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntryId, &Slot<E>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let slot = slot.as_ref()?;
            let id: EntryId = idx.try_into().expect("too many entries in rank map");
            Some((id, slot))
        })
    }
}

impl<E, H> IdentityIndex<E, H>
where
    E: Ranked,
    H: BuildHasher,
{
    pub(crate) fn lookup<Q>(&self, key: &Q) -> Option<EntryId>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let slots = &self.slots;
        self.table
            .get(hash, |entry| Self::key_matches(slots, entry.id, key))
            .map(|entry| entry.id)
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&Slot<E>>
    where
        E::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key).map(|id| self.slot(id))
    }

    /// Stores a record under a fresh id. The key must not be present.
    pub(crate) fn insert(&mut self, entity: E, stamp: Stamp) -> EntryId {
        let hash = self.hasher.hash_one(entity.key());
        debug_assert!(self.lookup(entity.key()).is_none(), "duplicate key");
        let slot = Some(Slot { entity, stamp });
        let id = if let Some(id) = self.free_ids.pop() {
            self.slots[id as usize] = slot;
            id
        } else {
            let idx = self.slots.len();
            let id: EntryId = idx.try_into().expect("too many entries in rank map");
            self.slots.push(slot);
            id
        };
        self.table
            .insert(hash, KeyEntry { hash, id }, |entry| entry.hash);
        id
    }

    /// Overwrites the record held by `id` in place, returning the old one.
    pub(crate) fn replace(&mut self, id: EntryId, entity: E, stamp: Stamp) -> E {
        let slot = self
            .slots
            .get_mut(id as usize)
            .and_then(|slot| slot.as_mut())
            .expect("invalid entry id");
        debug_assert!(slot.entity.key() == entity.key(), "key changed on replace");
        slot.stamp = stamp;
        std::mem::replace(&mut slot.entity, entity)
    }

    pub(crate) fn remove(&mut self, id: EntryId) -> Slot<E> {
        let hash = self.hasher.hash_one(self.slot(id).entity.key());
        let removed = self.table.remove_entry(hash, |entry| entry.id == id);
        debug_assert!(removed.is_some(), "entry must exist when removing");
        self.free_ids.push(id);
        self.slots[id as usize].take().expect("invalid entry id")
    }

    #[inline]
    fn key_matches<Q>(slots: &[Option<Slot<E>>], id: EntryId, key: &Q) -> bool
    where
        E::Key: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        slots[id as usize]
            .as_ref()
            .is_some_and(|slot| slot.entity.key().borrow() == key)
    }
}
