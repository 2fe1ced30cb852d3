//! Structural Hashing
//!
//! Turns descriptors into cache keys. A key depends only on the *content* of
//! a descriptor, never on object identity, so structurally equal descriptors
//! built independently map to the same GPU object.
//!
//! Every descriptor is fed through an xxh3-128 digest. The low 64 bits become
//! the key; the full 128 bits are kept (when `verify_hashes` is on) as a
//! fingerprint in a per-kind ledger, so two different descriptors that land
//! on the same key are reported instead of silently sharing one object.
//!
//! | Kind | Hashed content |
//! |------|----------------|
//! | Shader module | final shader text |
//! | Bind group layout | per binding: index, visibility, resource kind |
//! | Bind group | layout key + per binding: SHA-256 of buffer/texel bytes, view or sampler key |
//! | Pipeline layout | `[global, material, geometry]` layout keys in slot order |
//! | Pipeline | render state + pipeline layout key + shader key |
//!
//! Entries are encoded in binding order, so the order in which a caller
//! happened to list them does not matter.

use std::collections::hash_map::Entry;
use std::hash::Hash;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use xxhash_rust::xxh3::{Xxh3, xxh3_128};

use crate::cache::kind::ResourceKind;
use crate::device::{
    BindGroupEntry, BoundResource, ContentDigest, GraphicsDevice, LayoutEntry, RenderState,
    SamplerKey, TextureViewKey,
};
use crate::keys::{BindGroupKey, BindGroupLayoutKey, PipelineKey, PipelineLayoutKey, ShaderKey};
use crate::settings::CacheSettings;

/// Hashable projection of a bound resource: what it *contains*, not which
/// handle it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BoundContent {
    Buffer {
        offset: u64,
        size: Option<u64>,
        digest: ContentDigest,
    },
    Texture {
        view: TextureViewKey,
        digest: ContentDigest,
    },
    Sampler(SamplerKey),
}

impl BoundContent {
    fn of<D: GraphicsDevice>(resource: &BoundResource<'_, D>) -> Self {
        match resource {
            BoundResource::Buffer {
                offset,
                size,
                contents,
                ..
            } => Self::Buffer {
                offset: *offset,
                size: size.map(std::num::NonZeroU64::get),
                digest: ContentDigest::of(contents),
            },
            BoundResource::Texture {
                view_key, contents, ..
            } => Self::Texture {
                view: *view_key,
                digest: ContentDigest::of(contents),
            },
            BoundResource::Sampler { descriptor, .. } => Self::Sampler(*descriptor),
        }
    }
}

fn fingerprint<T: Hash + ?Sized>(kind: ResourceKind, value: &T) -> u128 {
    let mut hasher = Xxh3::new();
    kind.hash(&mut hasher);
    value.hash(&mut hasher);
    hasher.digest128()
}

/// Descriptor → key conversion with shader memoization and collision checks.
pub struct StructuralHasher {
    settings: CacheSettings,
    global_layout: Option<BindGroupLayoutKey>,
    shader_memo: FxHashMap<Box<str>, ShaderKey>,
    ledger: FxHashMap<(ResourceKind, u64), u128>,
    collisions: usize,
}

impl Default for StructuralHasher {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl StructuralHasher {
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            global_layout: None,
            shader_memo: FxHashMap::default(),
            ledger: FxHashMap::default(),
            collisions: 0,
        }
    }

    /// Hashes the global (slot 0) layout and folds it into every pipeline
    /// layout key from now on.
    pub fn register_global_layout(&mut self, entries: &[LayoutEntry]) -> BindGroupLayoutKey {
        let key = self.bind_group_layout(entries);
        self.global_layout = Some(key);
        key
    }

    #[inline]
    #[must_use]
    pub fn global_layout(&self) -> Option<BindGroupLayoutKey> {
        self.global_layout
    }

    // ── Keys ─────────────────────────────────────────────────────────────────

    /// Key of the final (template-expanded) shader text. Memoized per text.
    pub fn shader_source(&mut self, source: &str) -> ShaderKey {
        if let Some(&key) = self.shader_memo.get(source) {
            return key;
        }

        if self.shader_memo.len() >= self.settings.shader_memo_capacity {
            log::debug!(
                "Shader hash memo reached {} entries, clearing",
                self.shader_memo.len()
            );
            self.shader_memo.clear();
        }

        let fp = xxh3_128(source.as_bytes());
        let key = ShaderKey(self.record(ResourceKind::ShaderModule, fp));
        self.shader_memo.insert(source.into(), key);
        key
    }

    pub fn bind_group_layout(&mut self, entries: &[LayoutEntry]) -> BindGroupLayoutKey {
        let mut sorted: SmallVec<[LayoutEntry; 8]> = SmallVec::from_slice(entries);
        sorted.sort_by_key(|entry| entry.binding);

        let fp = fingerprint(ResourceKind::BindGroupLayout, sorted.as_slice());
        BindGroupLayoutKey(self.record(ResourceKind::BindGroupLayout, fp))
    }

    /// Key of a bind group built for `layout`.
    ///
    /// Buffers and textures are addressed by a SHA-256 of their bytes, so
    /// byte-identical resources from different origins share one bind group.
    pub fn bind_group<D: GraphicsDevice>(
        &mut self,
        layout: BindGroupLayoutKey,
        entries: &[BindGroupEntry<'_, D>],
    ) -> BindGroupKey {
        let mut contents: SmallVec<[(u32, BoundContent); 8]> = entries
            .iter()
            .map(|entry| (entry.binding, BoundContent::of(&entry.resource)))
            .collect();
        contents.sort_by_key(|(binding, _)| *binding);

        let fp = fingerprint(ResourceKind::BindGroup, &(layout, contents.as_slice()));
        BindGroupKey(self.record(ResourceKind::BindGroup, fp))
    }

    /// Key of the pipeline layout `[global, material, geometry]`.
    pub fn pipeline_layout(
        &mut self,
        material: BindGroupLayoutKey,
        geometry: BindGroupLayoutKey,
    ) -> PipelineLayoutKey {
        let fp = fingerprint(
            ResourceKind::PipelineLayout,
            &(self.global_layout, material, geometry),
        );
        PipelineLayoutKey(self.record(ResourceKind::PipelineLayout, fp))
    }

    pub fn pipeline(
        &mut self,
        state: &RenderState,
        layout: PipelineLayoutKey,
        shader: ShaderKey,
    ) -> PipelineKey {
        let fp = fingerprint(ResourceKind::Pipeline, &(state, layout, shader));
        PipelineKey(self.record(ResourceKind::Pipeline, fp))
    }

    // ── Bookkeeping ──────────────────────────────────────────────────────────

    /// Number of collisions detected so far.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    #[must_use]
    pub fn memoized_shaders(&self) -> usize {
        self.shader_memo.len()
    }

    /// Number of fingerprints currently held for collision checks.
    #[must_use]
    pub fn fingerprints(&self) -> usize {
        self.ledger.len()
    }

    /// Drops the shader memo and the collision ledger. Keys stay valid.
    pub fn clear(&mut self) {
        self.shader_memo.clear();
        self.ledger.clear();
    }

    fn record(&mut self, kind: ResourceKind, fp: u128) -> u64 {
        let key = fp as u64;
        if !self.settings.verify_hashes {
            return key;
        }

        if self.ledger.len() >= self.settings.ledger_capacity
            && !self.ledger.contains_key(&(kind, key))
        {
            log::debug!("Fingerprint ledger reached {} entries, clearing", self.ledger.len());
            self.ledger.clear();
        }

        match self.ledger.entry((kind, key)) {
            Entry::Vacant(slot) => {
                slot.insert(fp);
            }
            Entry::Occupied(slot) if *slot.get() != fp => {
                self.collisions += 1;
                log::error!(
                    "Structural hash collision on {kind} {key:016x}: fingerprints {:032x} and {fp:032x}",
                    slot.get()
                );
                assert!(
                    !self.settings.panic_on_collision,
                    "structural hash collision on {kind} {key:016x}"
                );
            }
            Entry::Occupied(_) => {}
        }
        key
    }
}
