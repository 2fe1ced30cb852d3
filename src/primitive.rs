//! Primitive Assembly
//!
//! Drives the bottom-up append flow for one primitive:
//!
//! ```text
//! shader ─> material layout ─> geometry layout ─> bind group ─> pipeline layout ─> pipeline
//! ```
//!
//! and handles runtime mutation of a primitive that is already in the cache
//! (texture swap, render state change, new shader variant).

use smallvec::SmallVec;

use crate::cache::{AnyKey, OwnerId, OwnerSet, ResourceCache, owner_set};
use crate::device::{BindGroupEntry, GraphicsDevice, LayoutEntry, RenderState};
use crate::errors::{CacheError, Result};
use crate::hashing::StructuralHasher;
use crate::render_setup::PrimitiveKeys;
use crate::settings::CacheSettings;

/// Everything needed to build the GPU objects of one primitive.
pub struct PrimitiveDescriptor<'a, D: GraphicsDevice> {
    /// Debug label forwarded to the device.
    pub label: &'a str,
    /// Final, template-expanded shader text.
    pub shader_source: &'a str,
    pub material_layout: &'a [LayoutEntry],
    pub material_entries: &'a [BindGroupEntry<'a, D>],
    pub geometry_layout: &'a [LayoutEntry],
    pub render_state: &'a RenderState,
}

/// Keys one `append_keys` call added its owner to, released again if that
/// call or a later one in the same reassembly fails.
struct Acquired {
    owner: OwnerId,
    keys: SmallVec<[AnyKey; 6]>,
}

impl Acquired {
    fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            keys: SmallVec::new(),
        }
    }

    /// Remembers `key` if `owner` did not already hold it.
    fn note<D: GraphicsDevice>(&mut self, cache: &ResourceCache<D>, key: impl Into<AnyKey>) {
        let key = key.into();
        if !cache.owners(key).is_some_and(|owners| owners.contains(&self.owner)) {
            self.keys.push(key);
        }
    }

    fn roll_back<D: GraphicsDevice>(self, cache: &mut ResourceCache<D>) {
        let owners = owner_set([self.owner]);
        for key in self.keys.into_iter().rev() {
            // The failing step inserted nothing.
            if !cache.owners(key).is_some_and(|o| o.contains(&self.owner)) {
                continue;
            }
            if let Err(err) = cache.remove(key, &owners) {
                log::warn!("Rollback of {key} for {:?} failed: {err}", self.owner);
            }
        }
    }
}

pub struct PrimitiveAssembler<'a, D: GraphicsDevice> {
    device: &'a D,
    /// Layout of bind group 0, shared by every pipeline and owned by the caller.
    global_layout: &'a D::BindGroupLayout,
    settings: CacheSettings,
}

impl<'a, D: GraphicsDevice> PrimitiveAssembler<'a, D> {
    pub fn new(
        device: &'a D,
        global_layout: &'a D::BindGroupLayout,
        settings: CacheSettings,
    ) -> Self {
        Self {
            device,
            global_layout,
            settings,
        }
    }

    /// Computes every key of `desc` without touching the cache.
    pub fn hash_keys(
        &self,
        hasher: &mut StructuralHasher,
        desc: &PrimitiveDescriptor<'_, D>,
    ) -> PrimitiveKeys {
        let shader = hasher.shader_source(desc.shader_source);
        let bind_group_layout = hasher.bind_group_layout(desc.material_layout);
        let geometry_layout = hasher.bind_group_layout(desc.geometry_layout);
        let bind_group = hasher.bind_group(bind_group_layout, desc.material_entries);
        let pipeline_layout = hasher.pipeline_layout(bind_group_layout, geometry_layout);
        let pipeline = hasher.pipeline(desc.render_state, pipeline_layout, shader);

        PrimitiveKeys {
            pipeline,
            pipeline_layout,
            bind_group,
            bind_group_layout,
            geometry_layout,
            shader,
        }
    }

    /// Hashes `desc` and appends every object for `owner`.
    ///
    /// On error, keys this call added `owner` to are released again.
    pub fn assemble(
        &self,
        cache: &mut ResourceCache<D>,
        hasher: &mut StructuralHasher,
        owner: OwnerId,
        desc: &PrimitiveDescriptor<'_, D>,
    ) -> Result<PrimitiveKeys> {
        let keys = self.hash_keys(hasher, desc);
        self.append_keys(cache, owner, &keys, desc)?;
        Ok(keys)
    }

    /// Re-targets `owners`, currently assembled as `old`, to `desc`.
    ///
    /// The new keys are appended for each owner first. If any build fails,
    /// those appends are rolled back and `old` stays intact. Only then is
    /// `old` released: a changed material layout runs the invalidation
    /// cascade on it, and any other old key the new descriptor no longer uses
    /// is removed for `owners`.
    pub fn reassemble(
        &self,
        cache: &mut ResourceCache<D>,
        hasher: &mut StructuralHasher,
        owners: &OwnerSet,
        old: &PrimitiveKeys,
        desc: &PrimitiveDescriptor<'_, D>,
    ) -> Result<PrimitiveKeys> {
        let new = self.hash_keys(hasher, desc);
        if new == *old {
            return Ok(new);
        }

        let current = new.keys_top_down();
        let mut stale: SmallVec<[AnyKey; 6]> = SmallVec::new();
        for key in old.keys_top_down() {
            if !current.contains(&key) && !stale.contains(&key) {
                stale.push(key);
            }
        }
        if let Some(&key) = stale
            .iter()
            .find(|&&key| !cache.owners(key).is_some_and(|o| !o.is_disjoint(owners)))
        {
            log::error!("Reassembling '{}': {key} is not held by {owners:?}", desc.label);
            return Err(CacheError::inconsistent(key, owners));
        }

        let mut sorted: SmallVec<[OwnerId; 8]> = owners.iter().copied().collect();
        sorted.sort_unstable();
        let mut appended: SmallVec<[Acquired; 4]> = SmallVec::new();
        for owner in sorted {
            match self.append_keys(cache, owner, &new, desc) {
                Ok(acquired) => appended.push(acquired),
                Err(err) => {
                    for acquired in appended.into_iter().rev() {
                        acquired.roll_back(cache);
                    }
                    return Err(err);
                }
            }
        }

        // A material layout the new keys still use (e.g. as geometry layout)
        // is not stale and must not cascade.
        if stale.contains(&AnyKey::from(old.bind_group_layout)) {
            let report = cache.invalidate_bind_group_layout(old.bind_group_layout, owners)?;
            log::debug!(
                "Material layout changed: released {} entries, shrunk {}",
                report.released.len(),
                report.shrunk.len()
            );
        }

        for key in stale {
            // The cascade may already have removed these owners.
            if !cache.owners(key).is_some_and(|o| !o.is_disjoint(owners)) {
                continue;
            }
            cache.remove(key, owners)?;
        }
        Ok(new)
    }

    fn append_keys(
        &self,
        cache: &mut ResourceCache<D>,
        owner: OwnerId,
        keys: &PrimitiveKeys,
        desc: &PrimitiveDescriptor<'_, D>,
    ) -> Result<Acquired> {
        let mut acquired = Acquired::new(owner);
        match self.append_in_order(cache, owner, keys, desc, &mut acquired) {
            Ok(()) => Ok(acquired),
            Err(err) => {
                log::error!("Assembling '{}' failed: {err}", desc.label);
                acquired.roll_back(cache);
                Err(err)
            }
        }
    }

    fn append_in_order(
        &self,
        cache: &mut ResourceCache<D>,
        owner: OwnerId,
        keys: &PrimitiveKeys,
        desc: &PrimitiveDescriptor<'_, D>,
        acquired: &mut Acquired,
    ) -> Result<()> {
        let device = self.device;
        let label = desc.label;

        acquired.note(cache, keys.shader);
        cache.append_shader_module(keys.shader, owner, || {
            if self.settings.log_shader_source {
                log::trace!("Compiling {} for '{label}':\n{}", keys.shader, desc.shader_source);
            }
            device.create_shader_module(label, desc.shader_source)
        })?;

        acquired.note(cache, keys.bind_group_layout);
        cache.append_bind_group_layout(keys.bind_group_layout, owner, || {
            device.create_bind_group_layout(label, desc.material_layout)
        })?;

        acquired.note(cache, keys.geometry_layout);
        cache.append_bind_group_layout(keys.geometry_layout, owner, || {
            device.create_bind_group_layout(label, desc.geometry_layout)
        })?;

        acquired.note(cache, keys.bind_group);
        cache.append_bind_group(keys.bind_group, owner, keys.bind_group_layout, |layout| {
            device.create_bind_group(label, layout, desc.material_entries)
        })?;

        let global = self.global_layout;
        acquired.note(cache, keys.pipeline_layout);
        cache.append_pipeline_layout(
            keys.pipeline_layout,
            owner,
            [keys.bind_group_layout, keys.geometry_layout],
            |material, geometry| {
                device.create_pipeline_layout(label, &[global, material, geometry])
            },
        )?;

        acquired.note(cache, keys.pipeline);
        cache.append_pipeline(
            keys.pipeline,
            owner,
            keys.pipeline_layout,
            keys.shader,
            |layout, shader| {
                device.create_render_pipeline(label, layout, shader, desc.render_state)
            },
        )?;

        Ok(())
    }
}
