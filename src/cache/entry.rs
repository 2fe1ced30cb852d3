//! Owner-counted storage for one resource kind.
//!
//! A [`ResourceMap`] maps a key to a [`Slot`]. A slot is either `Ready` (the
//! compiled resource plus its owner set) or `Building` (an in-flight deferred
//! construction that has already collected owners). An absent key is simply
//! not in the map.
//!
//! Each reservation is stamped with a generation, so a build that was
//! abandoned and re-reserved cannot install into (or fail) the newer slot.
//!
//! Invariant: a slot exists iff its owner set is non-empty. Whatever empties
//! an owner set removes the slot in the same call, and dropping a `Ready`
//! slot releases the GPU object.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use super::kind::AnyKey;
use super::owner::{OwnerId, OwnerSet};
use crate::errors::{CacheError, Result};

/// A compiled resource and the primitives that depend on it.
#[derive(Debug)]
pub struct CacheEntry<T> {
    resource: T,
    owners: OwnerSet,
}

impl<T> CacheEntry<T> {
    fn new(resource: T, owners: OwnerSet) -> Self {
        debug_assert!(!owners.is_empty());
        Self { resource, owners }
    }

    #[inline]
    #[must_use]
    pub fn resource(&self) -> &T {
        &self.resource
    }

    #[inline]
    #[must_use]
    pub fn owners(&self) -> &OwnerSet {
        &self.owners
    }
}

#[derive(Debug)]
pub(crate) enum Slot<T> {
    Building { owners: OwnerSet, generation: u64 },
    Ready(CacheEntry<T>),
}

impl<T> Slot<T> {
    fn owners(&self) -> &OwnerSet {
        match self {
            Self::Building { owners, .. } => owners,
            Self::Ready(entry) => &entry.owners,
        }
    }

    fn owners_mut(&mut self) -> &mut OwnerSet {
        match self {
            Self::Building { owners, .. } => owners,
            Self::Ready(entry) => &mut entry.owners,
        }
    }
}

/// What an append did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The key was unseen; the resource was built and inserted.
    Created,
    /// The key was already built; only the owner set grew.
    Shared,
    /// The key is being built by a deferred task; the owner joined it.
    Pending,
}

/// What a removal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The removed owners covered the whole owner set; the entry and its GPU
    /// object are gone.
    Released,
    /// Same as `Released`, but the entry was still being built. The late
    /// result will be discarded.
    Abandoned,
    /// Some owners remain.
    Shrunk { remaining: usize },
}

impl Removal {
    #[inline]
    #[must_use]
    pub fn is_gone(self) -> bool {
        matches!(self, Self::Released | Self::Abandoned)
    }
}

/// Result of reserving a key for a deferred build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reservation {
    /// No slot existed; a `Building` slot of this generation now holds the
    /// owner and the caller must run the build.
    Started(u64),
    /// A slot existed (ready or building); the owner joined it.
    Joined(AppendOutcome),
}

/// Result of installing a deferred build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Installed,
    /// Every owner left while the build was in flight.
    Discarded,
    /// The slot belongs to a newer reservation, or is already ready.
    Stale,
}

pub(crate) struct ResourceMap<K, T> {
    slots: FxHashMap<K, Slot<T>>,
    next_generation: u64,
}

impl<K, T> ResourceMap<K, T>
where
    K: Copy + Eq + Hash + Into<AnyKey>,
{
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            next_generation: 0,
        }
    }

    /// Number of slots, including in-flight ones.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Building { .. }))
            .count()
    }

    #[inline]
    pub(crate) fn contains(&self, key: K) -> bool {
        self.slots.contains_key(&key)
    }

    /// The built resource, or `None` if the key is absent or still building.
    #[inline]
    pub(crate) fn resolve(&self, key: K) -> Option<&T> {
        match self.slots.get(&key)? {
            Slot::Ready(entry) => Some(&entry.resource),
            Slot::Building { .. } => None,
        }
    }

    pub(crate) fn entry(&self, key: K) -> Option<&CacheEntry<T>> {
        match self.slots.get(&key)? {
            Slot::Ready(entry) => Some(entry),
            Slot::Building { .. } => None,
        }
    }

    pub(crate) fn owners(&self, key: K) -> Option<&OwnerSet> {
        self.slots.get(&key).map(Slot::owners)
    }

    /// Whether any of `owners` is recorded for `key`.
    pub(crate) fn is_owned_by_any(&self, key: K, owners: &OwnerSet) -> bool {
        self.slots
            .get(&key)
            .is_some_and(|slot| !slot.owners().is_disjoint(owners))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.slots.keys().copied()
    }

    /// Get-or-create. `build` runs only when `key` has no slot; if it fails
    /// the map is untouched.
    pub(crate) fn append_with<F>(
        &mut self,
        key: K,
        owner: OwnerId,
        build: F,
    ) -> Result<AppendOutcome>
    where
        F: FnOnce() -> Result<T>,
    {
        match self.slots.get_mut(&key) {
            Some(Slot::Ready(entry)) => {
                entry.owners.insert(owner);
                return Ok(AppendOutcome::Shared);
            }
            Some(Slot::Building { owners, .. }) => {
                owners.insert(owner);
                return Ok(AppendOutcome::Pending);
            }
            None => {}
        }

        let resource = build()?;
        let mut owners = OwnerSet::default();
        owners.insert(owner);
        self.slots
            .insert(key, Slot::Ready(CacheEntry::new(resource, owners)));
        log::debug!("Created {}", key.into());
        Ok(AppendOutcome::Created)
    }

    /// Registers `owner` against `key`, opening an in-flight slot if the key
    /// is unseen.
    pub(crate) fn reserve(&mut self, key: K, owner: OwnerId) -> Reservation {
        match self.slots.get_mut(&key) {
            Some(Slot::Ready(entry)) => {
                entry.owners.insert(owner);
                Reservation::Joined(AppendOutcome::Shared)
            }
            Some(Slot::Building { owners, .. }) => {
                owners.insert(owner);
                Reservation::Joined(AppendOutcome::Pending)
            }
            None => {
                let generation = self.next_generation;
                self.next_generation += 1;
                let mut owners = OwnerSet::default();
                owners.insert(owner);
                self.slots.insert(key, Slot::Building { owners, generation });
                log::debug!("Reserved {} for deferred build #{generation}", key.into());
                Reservation::Started(generation)
            }
        }
    }

    /// Installs the result of the deferred build reserved as `generation`.
    pub(crate) fn complete(&mut self, key: K, generation: u64, resource: T) -> Completion {
        let Some(slot) = self.slots.get_mut(&key) else {
            log::debug!("Discarding late build of {}: no owners left", key.into());
            return Completion::Discarded;
        };
        match slot {
            Slot::Building {
                owners,
                generation: current,
            } if *current == generation => {
                let owners = std::mem::take(owners);
                *slot = Slot::Ready(CacheEntry::new(resource, owners));
                log::debug!("Created {} (deferred)", key.into());
                Completion::Installed
            }
            _ => Completion::Stale,
        }
    }

    /// Drops the in-flight slot reserved as `generation` after its build
    /// failed, returning its owners. Newer slots for the same key are kept.
    pub(crate) fn fail(&mut self, key: K, generation: u64) -> Option<OwnerSet> {
        match self.slots.get(&key) {
            Some(Slot::Building {
                generation: current,
                ..
            }) if *current == generation => match self.slots.remove(&key) {
                Some(Slot::Building { owners, .. }) => Some(owners),
                _ => None,
            },
            _ => None,
        }
    }

    /// Removes `owners` from `key`.
    ///
    /// If `owners` covers the whole owner set the slot is deleted (releasing
    /// the resource); otherwise the owners are subtracted in place. Naming
    /// only owners that were never recorded, or a key that does not exist,
    /// is an [`CacheError::InconsistentOwnerSet`] and changes nothing.
    pub(crate) fn remove(&mut self, key: K, owners: &OwnerSet) -> Result<Removal> {
        let covers_all = match self.slots.get(&key) {
            Some(slot) if !slot.owners().is_disjoint(owners) => slot.owners().is_subset(owners),
            _ => {
                log::error!(
                    "Owner set mismatch on {}: {:?} were never recorded",
                    key.into(),
                    owners
                );
                return Err(CacheError::inconsistent(key, owners));
            }
        };

        if covers_all {
            return Ok(match self.slots.remove(&key) {
                Some(Slot::Building { .. }) => {
                    log::debug!("Abandoned in-flight {}", key.into());
                    Removal::Abandoned
                }
                _ => {
                    log::debug!("Released {}", key.into());
                    Removal::Released
                }
            });
        }

        let Some(slot) = self.slots.get_mut(&key) else {
            unreachable!("slot checked above");
        };
        let current = slot.owners_mut();
        current.retain(|owner| !owners.contains(owner));
        Ok(Removal::Shrunk {
            remaining: current.len(),
        })
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::cache::owner::owner_set;
    use crate::errors::DeviceError;
    use crate::keys::PipelineKey;

    struct Tracked(Rc<Cell<usize>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn map() -> ResourceMap<PipelineKey, Tracked> {
        ResourceMap::with_capacity(4)
    }

    const KEY: PipelineKey = PipelineKey::from_raw(7);

    #[test]
    fn build_runs_once_per_key() {
        let drops = Rc::new(Cell::new(0));
        let builds = Cell::new(0);
        let mut m = map();

        for owner in [1, 2, 2] {
            m.append_with(KEY, OwnerId(owner), || {
                builds.set(builds.get() + 1);
                Ok(Tracked(drops.clone()))
            })
            .unwrap();
        }

        assert_eq!(builds.get(), 1);
        assert_eq!(m.owners(KEY).unwrap().len(), 2);
    }

    #[test]
    fn failed_build_leaves_nothing_behind() {
        let mut m = map();
        let err = m
            .append_with(KEY, OwnerId(1), || {
                Err(CacheError::construction(KEY, DeviceError::new("rejected")))
            })
            .unwrap_err();

        assert!(matches!(err, CacheError::ConstructionFailure { .. }));
        assert!(!m.contains(KEY));
        assert_eq!(m.len(), 0);
    }

    #[test]
    fn superset_removal_releases_once() {
        let drops = Rc::new(Cell::new(0));
        let mut m = map();
        for owner in [1, 2] {
            m.append_with(KEY, OwnerId(owner), || Ok(Tracked(drops.clone())))
                .unwrap();
        }

        let removal = m.remove(KEY, &owner_set([1u64, 2, 3])).unwrap();
        assert_eq!(removal, Removal::Released);
        assert_eq!(drops.get(), 1);
        assert!(!m.contains(KEY));
    }

    #[test]
    fn partial_removal_shrinks_in_place() {
        let drops = Rc::new(Cell::new(0));
        let mut m = map();
        for owner in [1, 2] {
            m.append_with(KEY, OwnerId(owner), || Ok(Tracked(drops.clone())))
                .unwrap();
        }

        let removal = m.remove(KEY, &owner_set([1u64])).unwrap();
        assert_eq!(removal, Removal::Shrunk { remaining: 1 });
        assert_eq!(drops.get(), 0);
        assert!(m.owners(KEY).unwrap().contains(&OwnerId(2)));
    }

    #[test]
    fn disjoint_removal_is_rejected_without_mutation() {
        let drops = Rc::new(Cell::new(0));
        let mut m = map();
        m.append_with(KEY, OwnerId(1), || Ok(Tracked(drops.clone())))
            .unwrap();

        let err = m.remove(KEY, &owner_set([9u64])).unwrap_err();
        assert!(matches!(err, CacheError::InconsistentOwnerSet { .. }));
        assert_eq!(m.owners(KEY).unwrap().len(), 1);

        let err = m.remove(PipelineKey::from_raw(8), &owner_set([1u64])).unwrap_err();
        assert!(matches!(err, CacheError::InconsistentOwnerSet { .. }));
    }

    #[test]
    fn building_slot_collects_owners_and_is_not_resolvable() {
        let drops = Rc::new(Cell::new(0));
        let mut m = map();

        let Reservation::Started(generation) = m.reserve(KEY, OwnerId(1)) else {
            panic!("first reservation must start a build");
        };
        assert_eq!(
            m.reserve(KEY, OwnerId(2)),
            Reservation::Joined(AppendOutcome::Pending)
        );
        assert!(m.resolve(KEY).is_none());
        assert_eq!(m.pending_len(), 1);

        assert_eq!(
            m.complete(KEY, generation, Tracked(drops.clone())),
            Completion::Installed
        );
        assert!(m.resolve(KEY).is_some());
        assert_eq!(m.entry(KEY).unwrap().owners().len(), 2);
        assert_eq!(m.pending_len(), 0);
    }

    #[test]
    fn abandoned_build_result_is_dropped() {
        let drops = Rc::new(Cell::new(0));
        let mut m = map();
        let Reservation::Started(generation) = m.reserve(KEY, OwnerId(1)) else {
            panic!("first reservation must start a build");
        };

        assert_eq!(m.remove(KEY, &owner_set([1u64])).unwrap(), Removal::Abandoned);
        assert_eq!(
            m.complete(KEY, generation, Tracked(drops.clone())),
            Completion::Discarded
        );
        assert_eq!(drops.get(), 1);
        assert!(!m.contains(KEY));
    }

    #[test]
    fn stale_generation_cannot_touch_a_newer_reservation() {
        let drops = Rc::new(Cell::new(0));
        let mut m = map();
        let Reservation::Started(first) = m.reserve(KEY, OwnerId(1)) else {
            panic!("first reservation must start a build");
        };
        m.remove(KEY, &owner_set([1u64])).unwrap();
        let Reservation::Started(second) = m.reserve(KEY, OwnerId(2)) else {
            panic!("abandoned key must start a new build");
        };
        assert_ne!(first, second);

        assert!(m.fail(KEY, first).is_none());
        assert_eq!(m.complete(KEY, first, Tracked(drops.clone())), Completion::Stale);
        assert_eq!(drops.get(), 1);
        assert!(m.owners(KEY).unwrap().contains(&OwnerId(2)));

        assert_eq!(
            m.complete(KEY, second, Tracked(drops.clone())),
            Completion::Installed
        );
        assert!(m.resolve(KEY).is_some());
    }
}
