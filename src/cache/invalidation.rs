//! Invalidation cascade.
//!
//! When a material's bind group layout changes (a texture slot added, a
//! binding switched from uniform to storage, ...) every object built from the
//! old layout is stale for the primitives using that material. The cascade
//! removes those primitives from:
//!
//! 1. the old bind group layout,
//! 2. every bind group and pipeline layout built from it,
//! 3. every pipeline built from those pipeline layouts.
//!
//! The same owner set is removed at every level. Entries shared with other
//! primitives only shrink; entries owned solely by the mutated primitives are
//! released. Dependents that none of the owners reference are left alone.

use super::ResourceCache;
use super::entry::Removal;
use super::kind::AnyKey;
use super::owner::OwnerSet;
use crate::device::GraphicsDevice;
use crate::errors::{CacheError, Result};
use crate::keys::BindGroupLayoutKey;

/// What an invalidation removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Entries deleted outright, in removal order.
    pub released: Vec<AnyKey>,
    /// Entries that lost owners but are still used by others.
    pub shrunk: Vec<AnyKey>,
}

impl EvictionReport {
    fn record(&mut self, key: impl Into<AnyKey>, removal: Removal) {
        if removal.is_gone() {
            self.released.push(key.into());
        } else {
            self.shrunk.push(key.into());
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.shrunk.is_empty()
    }

    #[must_use]
    pub fn was_released(&self, key: impl Into<AnyKey>) -> bool {
        self.released.contains(&key.into())
    }
}

impl<D: GraphicsDevice> ResourceCache<D> {
    /// Removes `owners` from `old` and everything built from it.
    ///
    /// Fails with [`InconsistentOwnerSet`](CacheError::InconsistentOwnerSet)
    /// without touching anything if none of `owners` use `old`.
    pub fn invalidate_bind_group_layout(
        &mut self,
        old: BindGroupLayoutKey,
        owners: &OwnerSet,
    ) -> Result<EvictionReport> {
        if !self.bind_group_layouts.is_owned_by_any(old, owners) {
            return Err(CacheError::inconsistent(old, owners));
        }

        // Snapshot before anything is unlinked.
        let bind_groups = self.dependencies.bind_groups_of(old);
        let pipeline_layouts = self.dependencies.pipeline_layouts_of(old);
        let pipelines = self.dependencies.pipelines_through(old);

        log::debug!(
            "Invalidating {} for {} owner(s): {} bind group(s), {} pipeline layout(s), {} pipeline(s) affected",
            AnyKey::from(old),
            owners.len(),
            bind_groups.len(),
            pipeline_layouts.len(),
            pipelines.len()
        );

        let mut report = EvictionReport::default();

        let removal = self.remove_bind_group_layout(old, owners)?;
        report.record(old, removal);

        for key in bind_groups {
            if self.bind_groups.is_owned_by_any(key, owners) {
                let removal = self.remove_bind_group(key, owners)?;
                report.record(key, removal);
            }
        }

        for key in pipeline_layouts {
            if self.pipeline_layouts.is_owned_by_any(key, owners) {
                let removal = self.remove_pipeline_layout(key, owners)?;
                report.record(key, removal);
            }
        }

        for key in pipelines {
            if self.pipelines.is_owned_by_any(key, owners) {
                let removal = self.remove_pipeline(key, owners)?;
                report.record(key, removal);
            }
        }

        Ok(report)
    }
}
