//! Owner identifiers and owner sets.

use rustc_hash::FxHashSet;

/// Opaque identifier of a primitive (one drawable mesh part).
///
/// Primitives never own cache entries; they reference them by key and are
/// recorded in each entry's owner set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u64);

impl From<u64> for OwnerId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Set of primitives currently depending on a cache entry.
pub type OwnerSet = FxHashSet<OwnerId>;

/// Builds an [`OwnerSet`] from anything convertible into [`OwnerId`].
pub fn owner_set<I>(owners: I) -> OwnerSet
where
    I: IntoIterator,
    I::Item: Into<OwnerId>,
{
    owners.into_iter().map(Into::into).collect()
}
