//! Resource Cache
//!
//! Central owner of every deduplicated GPU object: shader modules, bind group
//! layouts, bind groups, pipeline layouts and render pipelines. Each kind has
//! its own owner-counted map keyed by a structural hash (see
//! [`StructuralHasher`](crate::hashing::StructuralHasher)).
//!
//! # Lifetime
//!
//! An entry is built on the first `append_*` for an unseen key, gains owners
//! on later appends, loses owners on `remove_*`, and is dropped (releasing the
//! GPU object) the moment its owner set is empty. Nothing is evicted for any
//! other reason.
//!
//! # Construction order
//!
//! Composite entries resolve their parents when they are built:
//!
//! ```text
//! bind group layout ─┬─> bind group
//!                    └─> pipeline layout ─┐
//! shader module ──────────────────────────┴─> pipeline
//! ```
//!
//! Appending a child before its parents is a
//! [`MissingDependency`](crate::errors::CacheError::MissingDependency).
//! Edges are recorded in a [`DependencyIndex`] for the invalidation cascade.
//!
//! # Threading
//!
//! The cache takes `&mut self` for every mutation and has no internal locking.
//! Work done elsewhere (e.g. image decoding) goes through
//! [`deferred`] builds, whose results are installed on the owning thread by
//! [`ResourceCache::collect_deferred`].

pub mod deferred;
pub mod dependency;
pub mod entry;
pub mod invalidation;
pub mod kind;
pub mod owner;

use rustc_hash::FxHashSet;

pub use deferred::DeferredBuild;
pub use dependency::DependencyIndex;
pub use entry::{AppendOutcome, CacheEntry, Removal};
pub use invalidation::EvictionReport;
pub use kind::{AnyKey, BuiltResource, ResourceKind};
pub use owner::{OwnerId, OwnerSet, owner_set};

use crate::device::GraphicsDevice;
use crate::errors::{CacheError, DeviceError, Result};
use crate::keys::{BindGroupKey, BindGroupLayoutKey, PipelineKey, PipelineLayoutKey, ShaderKey};
use crate::render_setup::PrimitiveKeys;
use crate::settings::CacheSettings;
use deferred::DeferredChannel;
use entry::ResourceMap;

/// Entry counts, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub shader_modules: usize,
    pub bind_group_layouts: usize,
    pub bind_groups: usize,
    pub pipeline_layouts: usize,
    pub pipelines: usize,
    /// Slots still waiting on a deferred build.
    pub pending: usize,
    pub dependency_edges: usize,
}

impl CacheStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.shader_modules
            + self.bind_group_layouts
            + self.bind_groups
            + self.pipeline_layouts
            + self.pipelines
    }
}

pub struct ResourceCache<D: GraphicsDevice> {
    settings: CacheSettings,

    pub(crate) shader_modules: ResourceMap<ShaderKey, D::ShaderModule>,
    pub(crate) bind_group_layouts: ResourceMap<BindGroupLayoutKey, D::BindGroupLayout>,
    pub(crate) bind_groups: ResourceMap<BindGroupKey, D::BindGroup>,
    pub(crate) pipeline_layouts: ResourceMap<PipelineLayoutKey, D::PipelineLayout>,
    pub(crate) pipelines: ResourceMap<PipelineKey, D::RenderPipeline>,

    pub(crate) dependencies: DependencyIndex,
    pub(crate) deferred: DeferredChannel<D>,
}

impl<D: GraphicsDevice> Default for ResourceCache<D> {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl<D: GraphicsDevice> ResourceCache<D> {
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        let capacity = settings.initial_capacity;
        Self {
            settings,
            shader_modules: ResourceMap::with_capacity(capacity),
            bind_group_layouts: ResourceMap::with_capacity(capacity),
            bind_groups: ResourceMap::with_capacity(capacity),
            pipeline_layouts: ResourceMap::with_capacity(capacity),
            pipelines: ResourceMap::with_capacity(capacity),
            dependencies: DependencyIndex::new(),
            deferred: DeferredChannel::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // ── Append (get-or-create) ───────────────────────────────────────────────

    pub fn append_shader_module<F>(
        &mut self,
        key: ShaderKey,
        owner: OwnerId,
        build: F,
    ) -> Result<AppendOutcome>
    where
        F: FnOnce() -> std::result::Result<D::ShaderModule, DeviceError>,
    {
        self.shader_modules.append_with(key, owner, || {
            build().map_err(|source| CacheError::construction(key, source))
        })
    }

    pub fn append_bind_group_layout<F>(
        &mut self,
        key: BindGroupLayoutKey,
        owner: OwnerId,
        build: F,
    ) -> Result<AppendOutcome>
    where
        F: FnOnce() -> std::result::Result<D::BindGroupLayout, DeviceError>,
    {
        self.bind_group_layouts.append_with(key, owner, || {
            build().map_err(|source| CacheError::construction(key, source))
        })
    }

    /// Get-or-create a bind group for `layout`. `build` receives the layout
    /// object and runs only on a miss.
    pub fn append_bind_group<F>(
        &mut self,
        key: BindGroupKey,
        owner: OwnerId,
        layout: BindGroupLayoutKey,
        build: F,
    ) -> Result<AppendOutcome>
    where
        F: FnOnce(&D::BindGroupLayout) -> std::result::Result<D::BindGroup, DeviceError>,
    {
        let layouts = &self.bind_group_layouts;
        let outcome = self.bind_groups.append_with(key, owner, || {
            let layout_obj = layouts.resolve(layout).ok_or_else(|| CacheError::missing(layout))?;
            build(layout_obj).map_err(|source| CacheError::construction(key, source))
        })?;

        if outcome == AppendOutcome::Created {
            self.dependencies.link_bind_group(layout, key);
        }
        Ok(outcome)
    }

    /// Get-or-create a pipeline layout over `[global, inputs[0], inputs[1]]`.
    /// `build` receives the material and geometry layout objects; the global
    /// layout is the caller's.
    pub fn append_pipeline_layout<F>(
        &mut self,
        key: PipelineLayoutKey,
        owner: OwnerId,
        inputs: [BindGroupLayoutKey; 2],
        build: F,
    ) -> Result<AppendOutcome>
    where
        F: FnOnce(
            &D::BindGroupLayout,
            &D::BindGroupLayout,
        ) -> std::result::Result<D::PipelineLayout, DeviceError>,
    {
        let layouts = &self.bind_group_layouts;
        let outcome = self.pipeline_layouts.append_with(key, owner, || {
            let [material, geometry] = inputs;
            let material = layouts.resolve(material).ok_or_else(|| CacheError::missing(material))?;
            let geometry = layouts.resolve(geometry).ok_or_else(|| CacheError::missing(geometry))?;
            build(material, geometry).map_err(|source| CacheError::construction(key, source))
        })?;

        if outcome == AppendOutcome::Created {
            self.dependencies.link_pipeline_layout(inputs, key);
        }
        Ok(outcome)
    }

    /// Get-or-create a render pipeline from `layout` and `shader`.
    pub fn append_pipeline<F>(
        &mut self,
        key: PipelineKey,
        owner: OwnerId,
        layout: PipelineLayoutKey,
        shader: ShaderKey,
        build: F,
    ) -> Result<AppendOutcome>
    where
        F: FnOnce(
            &D::PipelineLayout,
            &D::ShaderModule,
        ) -> std::result::Result<D::RenderPipeline, DeviceError>,
    {
        let layouts = &self.pipeline_layouts;
        let shaders = &self.shader_modules;
        let outcome = self.pipelines.append_with(key, owner, || {
            let layout_obj = layouts.resolve(layout).ok_or_else(|| CacheError::missing(layout))?;
            let shader_obj = shaders.resolve(shader).ok_or_else(|| CacheError::missing(shader))?;
            build(layout_obj, shader_obj).map_err(|source| CacheError::construction(key, source))
        })?;

        if outcome == AppendOutcome::Created {
            self.dependencies.link_pipeline(layout, key);
        }
        Ok(outcome)
    }

    // ── Remove ───────────────────────────────────────────────────────────────

    pub fn remove_shader_module(&mut self, key: ShaderKey, owners: &OwnerSet) -> Result<Removal> {
        self.shader_modules.remove(key, owners)
    }

    pub fn remove_bind_group_layout(
        &mut self,
        key: BindGroupLayoutKey,
        owners: &OwnerSet,
    ) -> Result<Removal> {
        self.bind_group_layouts.remove(key, owners)
    }

    pub fn remove_bind_group(&mut self, key: BindGroupKey, owners: &OwnerSet) -> Result<Removal> {
        let removal = self.bind_groups.remove(key, owners)?;
        if removal.is_gone() {
            self.dependencies.unlink_bind_group(key);
        }
        Ok(removal)
    }

    pub fn remove_pipeline_layout(
        &mut self,
        key: PipelineLayoutKey,
        owners: &OwnerSet,
    ) -> Result<Removal> {
        let removal = self.pipeline_layouts.remove(key, owners)?;
        if removal.is_gone() {
            self.dependencies.unlink_pipeline_layout(key);
        }
        Ok(removal)
    }

    pub fn remove_pipeline(&mut self, key: PipelineKey, owners: &OwnerSet) -> Result<Removal> {
        let removal = self.pipelines.remove(key, owners)?;
        if removal.is_gone() {
            self.dependencies.unlink_pipeline(key);
        }
        Ok(removal)
    }

    /// Removes `owners` from the entry behind any key.
    pub fn remove(&mut self, key: AnyKey, owners: &OwnerSet) -> Result<Removal> {
        match key {
            AnyKey::ShaderModule(k) => self.remove_shader_module(k, owners),
            AnyKey::BindGroupLayout(k) => self.remove_bind_group_layout(k, owners),
            AnyKey::BindGroup(k) => self.remove_bind_group(k, owners),
            AnyKey::PipelineLayout(k) => self.remove_pipeline_layout(k, owners),
            AnyKey::Pipeline(k) => self.remove_pipeline(k, owners),
        }
    }

    /// Dispose hook for one scene object.
    ///
    /// Collects the distinct keys referenced by `primitives` and removes
    /// `owners` from each, top-down (pipelines first, shaders last). Every
    /// key is attempted even if one fails; the first error is returned.
    pub fn dispose<'k, I>(&mut self, primitives: I, owners: &OwnerSet) -> Result<()>
    where
        I: IntoIterator<Item = &'k PrimitiveKeys>,
    {
        let mut seen = FxHashSet::default();
        let mut keys: Vec<AnyKey> = Vec::new();
        for primitive in primitives {
            for key in primitive.keys_top_down() {
                if seen.insert(key) {
                    keys.push(key);
                }
            }
        }
        keys.sort_by_key(|key| std::cmp::Reverse(key.kind()));

        let mut first_error = None;
        for key in keys {
            if let Err(err) = self.remove(key, owners) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    // ── Resolve (read-only) ──────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn resolve_shader_module(&self, key: ShaderKey) -> Option<&D::ShaderModule> {
        self.shader_modules.resolve(key)
    }

    #[inline]
    #[must_use]
    pub fn resolve_bind_group_layout(
        &self,
        key: BindGroupLayoutKey,
    ) -> Option<&D::BindGroupLayout> {
        self.bind_group_layouts.resolve(key)
    }

    #[inline]
    #[must_use]
    pub fn resolve_bind_group(&self, key: BindGroupKey) -> Option<&D::BindGroup> {
        self.bind_groups.resolve(key)
    }

    #[inline]
    #[must_use]
    pub fn resolve_pipeline_layout(&self, key: PipelineLayoutKey) -> Option<&D::PipelineLayout> {
        self.pipeline_layouts.resolve(key)
    }

    #[inline]
    #[must_use]
    pub fn resolve_pipeline(&self, key: PipelineKey) -> Option<&D::RenderPipeline> {
        self.pipelines.resolve(key)
    }

    /// Whether a slot (built or in flight) exists for `key`.
    #[must_use]
    pub fn contains(&self, key: AnyKey) -> bool {
        match key {
            AnyKey::ShaderModule(k) => self.shader_modules.contains(k),
            AnyKey::BindGroupLayout(k) => self.bind_group_layouts.contains(k),
            AnyKey::BindGroup(k) => self.bind_groups.contains(k),
            AnyKey::PipelineLayout(k) => self.pipeline_layouts.contains(k),
            AnyKey::Pipeline(k) => self.pipelines.contains(k),
        }
    }

    /// Whether `key` is built and resolvable.
    #[must_use]
    pub fn is_ready(&self, key: AnyKey) -> bool {
        match key {
            AnyKey::ShaderModule(k) => self.shader_modules.resolve(k).is_some(),
            AnyKey::BindGroupLayout(k) => self.bind_group_layouts.resolve(k).is_some(),
            AnyKey::BindGroup(k) => self.bind_groups.resolve(k).is_some(),
            AnyKey::PipelineLayout(k) => self.pipeline_layouts.resolve(k).is_some(),
            AnyKey::Pipeline(k) => self.pipelines.resolve(k).is_some(),
        }
    }

    /// Current owners of `key` (built or in flight).
    #[must_use]
    pub fn owners(&self, key: AnyKey) -> Option<&OwnerSet> {
        match key {
            AnyKey::ShaderModule(k) => self.shader_modules.owners(k),
            AnyKey::BindGroupLayout(k) => self.bind_group_layouts.owners(k),
            AnyKey::BindGroup(k) => self.bind_groups.owners(k),
            AnyKey::PipelineLayout(k) => self.pipeline_layouts.owners(k),
            AnyKey::Pipeline(k) => self.pipelines.owners(k),
        }
    }

    #[must_use]
    pub fn pipeline_entry(&self, key: PipelineKey) -> Option<&CacheEntry<D::RenderPipeline>> {
        self.pipelines.entry(key)
    }

    #[must_use]
    pub fn len(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::ShaderModule => self.shader_modules.len(),
            ResourceKind::BindGroupLayout => self.bind_group_layouts.len(),
            ResourceKind::BindGroup => self.bind_groups.len(),
            ResourceKind::PipelineLayout => self.pipeline_layouts.len(),
            ResourceKind::Pipeline => self.pipelines.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        ResourceKind::ALL.iter().all(|&kind| self.len(kind) == 0)
    }

    /// Keys of every slot of `kind`.
    #[must_use]
    pub fn keys(&self, kind: ResourceKind) -> Vec<AnyKey> {
        match kind {
            ResourceKind::ShaderModule => self.shader_modules.keys().map(AnyKey::from).collect(),
            ResourceKind::BindGroupLayout => {
                self.bind_group_layouts.keys().map(AnyKey::from).collect()
            }
            ResourceKind::BindGroup => self.bind_groups.keys().map(AnyKey::from).collect(),
            ResourceKind::PipelineLayout => {
                self.pipeline_layouts.keys().map(AnyKey::from).collect()
            }
            ResourceKind::Pipeline => self.pipelines.keys().map(AnyKey::from).collect(),
        }
    }

    #[must_use]
    pub fn dependencies(&self) -> &DependencyIndex {
        &self.dependencies
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            shader_modules: self.shader_modules.len(),
            bind_group_layouts: self.bind_group_layouts.len(),
            bind_groups: self.bind_groups.len(),
            pipeline_layouts: self.pipeline_layouts.len(),
            pipelines: self.pipelines.len(),
            pending: self.shader_modules.pending_len() + self.bind_groups.pending_len(),
            dependency_edges: self.dependencies.edge_count(),
        }
    }

    /// Releases everything. Deferred builds still in flight will be discarded
    /// when they report back.
    pub fn clear(&mut self) {
        // Children before parents.
        self.pipelines.clear();
        self.pipeline_layouts.clear();
        self.bind_groups.clear();
        self.bind_group_layouts.clear();
        self.shader_modules.clear();
        self.dependencies.clear();
        log::debug!("Resource cache cleared");
    }
}
